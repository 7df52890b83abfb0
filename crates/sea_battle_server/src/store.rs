use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub name: String,
    pub last_login_id: String,
    pub password: String,
    pub register_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub wins: u32,
    pub defeats: u32,
    pub matches: u32,
    pub longest_match_secs: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Abstraction over the persistent users, black list and white list
/// consumed by the authentication flow and the server lifecycle.
/// Storage technology is not part of the contract; operations only
/// need to be atomic with respect to a single caller.
pub trait UserStore: Send + Sync {
    fn find(&self, name: &str) -> Option<UserRecord>;
    fn add(&self, name: &str, uid: &str, password: &str);
    fn update_login(&self, name: &str, uid: &str) -> bool;
    fn remove(&self, name: &str) -> bool;

    fn blacklist_contains(&self, name: &str, uid: &str) -> bool;
    fn blacklist_add(&self, name: &str, uid: &str);
    fn blacklist_remove(&self, name: &str) -> bool;

    /// Permission byte for a white-listed name; 0 means admin.
    fn whitelist_permission(&self, name: &str) -> Option<u8>;
    fn whitelist_add(&self, name: &str, permission: u8);

    fn stats(&self, name: &str) -> Option<PlayerStats>;
    fn set_stats(&self, name: &str, stats: PlayerStats);
}

#[derive(Debug, Clone)]
struct BlacklistEntry {
    name: String,
    uid: String,
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    stats: HashMap<String, PlayerStats>,
    black_list: Vec<BlacklistEntry>,
    white_list: HashMap<String, u8>,
}

/// In-memory store. Names are keyed lowercase, so every lookup is
/// case-insensitive like the persistent backends behave.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("store mutex poisoned")
    }
}

impl UserStore for MemoryStore {
    fn find(&self, name: &str) -> Option<UserRecord> {
        self.lock().users.get(&name.to_lowercase()).cloned()
    }

    fn add(&self, name: &str, uid: &str, password: &str) {
        let key = name.to_lowercase();
        let mut tables = self.lock();
        tables.users.insert(
            key.clone(),
            UserRecord {
                name: key.clone(),
                last_login_id: uid.to_string(),
                password: password.to_string(),
                register_date: Utc::now(),
            },
        );
        tables.stats.entry(key).or_default();
    }

    fn update_login(&self, name: &str, uid: &str) -> bool {
        match self.lock().users.get_mut(&name.to_lowercase()) {
            Some(record) => {
                record.last_login_id = uid.to_string();
                true
            }
            None => false,
        }
    }

    fn remove(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        let mut tables = self.lock();
        tables.stats.remove(&key);
        tables.users.remove(&key).is_some()
    }

    fn blacklist_contains(&self, name: &str, uid: &str) -> bool {
        self.lock()
            .black_list
            .iter()
            .any(|entry| entry.name.eq_ignore_ascii_case(name) || entry.uid == uid)
    }

    fn blacklist_add(&self, name: &str, uid: &str) {
        self.lock().black_list.push(BlacklistEntry {
            name: name.to_lowercase(),
            uid: uid.to_string(),
        });
    }

    fn blacklist_remove(&self, name: &str) -> bool {
        let mut tables = self.lock();
        let before = tables.black_list.len();
        tables
            .black_list
            .retain(|entry| !entry.name.eq_ignore_ascii_case(name));
        tables.black_list.len() < before
    }

    fn whitelist_permission(&self, name: &str) -> Option<u8> {
        self.lock().white_list.get(&name.to_lowercase()).copied()
    }

    fn whitelist_add(&self, name: &str, permission: u8) {
        self.lock().white_list.insert(name.to_lowercase(), permission);
    }

    fn stats(&self, name: &str) -> Option<PlayerStats> {
        self.lock().stats.get(&name.to_lowercase()).copied()
    }

    fn set_stats(&self, name: &str, stats: PlayerStats) {
        self.lock().stats.insert(name.to_lowercase(), stats);
    }
}
