pub mod battle_field;

#[cfg(test)]
mod battle_field_test;
