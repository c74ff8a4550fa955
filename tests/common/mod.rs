//! In-memory directory used by the integration tests.
//!
//! Keeps an active tree (which also holds preserved users) and a staging
//! area, replies with the same typed errors a FreeIPA server produces and
//! records every call in order.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tfipa::freeipa::{DirectoryClient, DirectoryError, Options, UserEntry};
use tfipa::user::{AccountState, UserRecord};

pub const GENERATED_PASSWORD: &str = "Gen3rated!Secret";

#[derive(Default)]
struct Tree {
    active: HashMap<String, Options>,
    staged: HashMap<String, Options>,
}

#[derive(Default)]
pub struct FakeDirectory {
    tree: Mutex<Tree>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

fn base_entry(uid: &str, first: &str, last: &str) -> Options {
    let mut attrs = Options::new();
    attrs.insert("uid".to_string(), json!([uid]));
    attrs.insert("givenname".to_string(), json!([first]));
    attrs.insert("sn".to_string(), json!([last]));
    attrs.insert("cn".to_string(), json!([format!("{} {}", first, last)]));
    attrs.insert("homedirectory".to_string(), json!([format!("/home/{}", uid)]));
    attrs.insert("uidnumber".to_string(), json!(["1001"]));
    attrs
}

fn first_str(attrs: &Options, key: &str) -> String {
    match attrs.get(key) {
        Some(Value::Array(values)) => values.first().and_then(Value::as_str),
        Some(value) => value.as_str(),
        None => None,
    }
    .unwrap_or_default()
    .to_string()
}

/// Fill in what the server assigns on add when the caller leaves it out.
fn server_defaults(uid: &str, id_number: usize, attrs: &mut Options) {
    let full_name = format!("{} {}", first_str(attrs, "givenname"), first_str(attrs, "sn"));
    let defaults = [
        ("cn", json!([full_name])),
        ("homedirectory", json!([format!("/home/{}", uid)])),
        ("loginshell", json!(["/bin/sh"])),
        ("uidnumber", json!([id_number.to_string()])),
        ("gidnumber", json!([id_number.to_string()])),
        ("krbprincipalname", json!([format!("{}@EXAMPLE.TEST", uid)])),
        ("mail", json!([format!("{}@example.test", uid)])),
    ];
    for (key, value) in defaults {
        attrs.entry(key.to_string()).or_insert(value);
    }
}

fn not_found(uid: &str) -> DirectoryError {
    DirectoryError::NotFound {
        what: format!("{}: user not found", uid),
    }
}

fn is_cleared(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(values) => values.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

/// Apply a `*_mod` option map the way the server does: empty values delete
/// the attribute and a map that changes nothing is rejected.
fn apply_changes(attrs: &mut Options, changes: Options) -> Result<(), DirectoryError> {
    let mut changed = false;
    for (key, value) in changes {
        if is_cleared(&value) {
            changed |= attrs.remove(&key).is_some();
        } else if attrs.get(&key) != Some(&value) {
            attrs.insert(key, value);
            changed = true;
        }
    }
    if changed {
        Ok(())
    } else {
        Err(DirectoryError::EmptyModlist)
    }
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active(self, uid: &str, disabled: bool) -> Self {
        let mut attrs = base_entry(uid, "Test", "User");
        attrs.insert("nsaccountlock".to_string(), json!(disabled));
        attrs.insert("preserved".to_string(), json!(false));
        self.tree.lock().unwrap().active.insert(uid.to_string(), attrs);
        self
    }

    pub fn with_preserved(self, uid: &str) -> Self {
        let mut attrs = base_entry(uid, "Test", "User");
        attrs.insert("nsaccountlock".to_string(), json!(true));
        attrs.insert("preserved".to_string(), json!(true));
        self.tree.lock().unwrap().active.insert(uid.to_string(), attrs);
        self
    }

    pub fn with_staged(self, uid: &str) -> Self {
        let attrs = base_entry(uid, "Test", "User");
        self.tree.lock().unwrap().staged.insert(uid.to_string(), attrs);
        self
    }

    /// Make every call to `method` fail with a generic server error.
    pub fn fail_on(&self, method: &str) {
        self.failing.lock().unwrap().insert(method.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn is_active(&self, uid: &str) -> bool {
        let tree = self.tree.lock().unwrap();
        tree.active
            .get(uid)
            .is_some_and(|attrs| attrs.get("preserved") != Some(&json!(true)))
    }

    pub fn is_preserved(&self, uid: &str) -> bool {
        let tree = self.tree.lock().unwrap();
        tree.active
            .get(uid)
            .is_some_and(|attrs| attrs.get("preserved") == Some(&json!(true)))
    }

    pub fn is_staged(&self, uid: &str) -> bool {
        self.tree.lock().unwrap().staged.contains_key(uid)
    }

    pub fn is_locked(&self, uid: &str) -> bool {
        let tree = self.tree.lock().unwrap();
        tree.active
            .get(uid)
            .is_some_and(|attrs| attrs.get("nsaccountlock") == Some(&json!(true)))
    }

    pub fn attribute(&self, uid: &str, key: &str) -> Option<Value> {
        let tree = self.tree.lock().unwrap();
        tree.active
            .get(uid)
            .or_else(|| tree.staged.get(uid))
            .and_then(|attrs| attrs.get(key).cloned())
    }

    fn record(&self, method: &str) -> Result<(), DirectoryError> {
        self.calls.lock().unwrap().push(method.to_string());
        if self.failing.lock().unwrap().contains(method) {
            return Err(DirectoryError::Remote {
                code: 903,
                name: "InternalError".to_string(),
                message: format!("{} failed", method),
            });
        }
        Ok(())
    }

    fn added_entry(uid: &str, options: &Options, attrs: &Options) -> UserEntry {
        let mut entry = attrs.clone();
        entry.insert("uid".to_string(), json!([uid]));
        if options.get("random") == Some(&json!(true)) {
            entry.insert("randompassword".to_string(), json!(GENERATED_PASSWORD));
        }
        UserEntry::new(entry)
    }

    fn stored(options: &Options) -> Options {
        options
            .iter()
            .filter(|(key, _)| key.as_str() != "random" && key.as_str() != "userpassword")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn user_add(&self, uid: &str, options: Options) -> Result<UserEntry, DirectoryError> {
        self.record("user_add")?;
        let mut tree = self.tree.lock().unwrap();
        if tree.active.contains_key(uid) {
            return Err(DirectoryError::Remote {
                code: 4002,
                name: "DuplicateEntry".to_string(),
                message: format!("user with name \"{}\" already exists", uid),
            });
        }
        let mut attrs = Self::stored(&options);
        attrs.insert("uid".to_string(), json!([uid]));
        server_defaults(uid, 1001 + tree.active.len(), &mut attrs);
        attrs.insert("nsaccountlock".to_string(), json!(false));
        attrs.insert("preserved".to_string(), json!(false));
        let entry = Self::added_entry(uid, &options, &attrs);
        tree.active.insert(uid.to_string(), attrs);
        Ok(entry)
    }

    async fn user_show(&self, uid: &str) -> Result<UserEntry, DirectoryError> {
        self.record("user_show")?;
        let tree = self.tree.lock().unwrap();
        tree.active
            .get(uid)
            .map(|attrs| UserEntry::new(attrs.clone()))
            .ok_or_else(|| not_found(uid))
    }

    async fn user_mod(&self, uid: &str, changes: Options) -> Result<UserEntry, DirectoryError> {
        self.record("user_mod")?;
        let mut tree = self.tree.lock().unwrap();
        let attrs = tree.active.get_mut(uid).ok_or_else(|| not_found(uid))?;
        apply_changes(attrs, changes)?;
        Ok(UserEntry::new(attrs.clone()))
    }

    async fn user_enable(&self, uid: &str) -> Result<(), DirectoryError> {
        self.record("user_enable")?;
        let mut tree = self.tree.lock().unwrap();
        let attrs = tree.active.get_mut(uid).ok_or_else(|| not_found(uid))?;
        if attrs.get("nsaccountlock") != Some(&json!(true)) {
            return Err(DirectoryError::AlreadyActive {
                uid: uid.to_string(),
            });
        }
        attrs.insert("nsaccountlock".to_string(), json!(false));
        Ok(())
    }

    async fn user_disable(&self, uid: &str) -> Result<(), DirectoryError> {
        self.record("user_disable")?;
        let mut tree = self.tree.lock().unwrap();
        let attrs = tree.active.get_mut(uid).ok_or_else(|| not_found(uid))?;
        if attrs.get("nsaccountlock") == Some(&json!(true)) {
            return Err(DirectoryError::AlreadyInactive {
                uid: uid.to_string(),
            });
        }
        attrs.insert("nsaccountlock".to_string(), json!(true));
        Ok(())
    }

    async fn user_del(&self, uid: &str, preserve: bool) -> Result<(), DirectoryError> {
        self.record(if preserve { "user_del --preserve" } else { "user_del" })?;
        let mut tree = self.tree.lock().unwrap();
        if preserve {
            let attrs = tree.active.get_mut(uid).ok_or_else(|| not_found(uid))?;
            attrs.insert("preserved".to_string(), json!(true));
            attrs.insert("nsaccountlock".to_string(), json!(true));
        } else {
            tree.active.remove(uid).ok_or_else(|| not_found(uid))?;
        }
        Ok(())
    }

    async fn user_undel(&self, uid: &str) -> Result<(), DirectoryError> {
        self.record("user_undel")?;
        let mut tree = self.tree.lock().unwrap();
        let attrs = tree.active.get_mut(uid).ok_or_else(|| not_found(uid))?;
        attrs.insert("preserved".to_string(), json!(false));
        attrs.insert("nsaccountlock".to_string(), json!(false));
        Ok(())
    }

    async fn user_stage(&self, uid: &str) -> Result<(), DirectoryError> {
        self.record("user_stage")?;
        let mut tree = self.tree.lock().unwrap();
        let mut attrs = tree.active.remove(uid).ok_or_else(|| not_found(uid))?;
        attrs.remove("preserved");
        attrs.remove("nsaccountlock");
        tree.staged.insert(uid.to_string(), attrs);
        Ok(())
    }

    async fn stageuser_add(
        &self,
        uid: &str,
        options: Options,
    ) -> Result<UserEntry, DirectoryError> {
        self.record("stageuser_add")?;
        let mut tree = self.tree.lock().unwrap();
        let mut attrs = Self::stored(&options);
        attrs.insert("uid".to_string(), json!([uid]));
        server_defaults(uid, 2001 + tree.staged.len(), &mut attrs);
        let entry = Self::added_entry(uid, &options, &attrs);
        tree.staged.insert(uid.to_string(), attrs);
        Ok(entry)
    }

    async fn stageuser_show(&self, uid: &str) -> Result<UserEntry, DirectoryError> {
        self.record("stageuser_show")?;
        let tree = self.tree.lock().unwrap();
        tree.staged
            .get(uid)
            .map(|attrs| UserEntry::new(attrs.clone()))
            .ok_or_else(|| not_found(uid))
    }

    async fn stageuser_mod(
        &self,
        uid: &str,
        changes: Options,
    ) -> Result<UserEntry, DirectoryError> {
        self.record("stageuser_mod")?;
        let mut tree = self.tree.lock().unwrap();
        let attrs = tree.staged.get_mut(uid).ok_or_else(|| not_found(uid))?;
        apply_changes(attrs, changes)?;
        Ok(UserEntry::new(attrs.clone()))
    }

    async fn stageuser_del(&self, uid: &str) -> Result<(), DirectoryError> {
        self.record("stageuser_del")?;
        let mut tree = self.tree.lock().unwrap();
        tree.staged.remove(uid).ok_or_else(|| not_found(uid))?;
        Ok(())
    }

    async fn stageuser_activate(&self, uid: &str) -> Result<(), DirectoryError> {
        self.record("stageuser_activate")?;
        let mut tree = self.tree.lock().unwrap();
        let mut attrs = tree.staged.remove(uid).ok_or_else(|| not_found(uid))?;
        attrs.insert("nsaccountlock".to_string(), json!(false));
        attrs.insert("preserved".to_string(), json!(false));
        tree.active.insert(uid.to_string(), attrs);
        Ok(())
    }
}

/// A record already stored in state for `uid` in `state`, matching what the
/// seeding helpers put in the directory.
pub fn stored_record(uid: &str, state: AccountState) -> UserRecord {
    let mut record = UserRecord::new(uid, "Test", "User");
    record.id = Some(uid.to_string());
    record.state = Some(state);
    match state {
        AccountState::Active => {}
        AccountState::Staged => record.account_staged = true,
        AccountState::Preserved => {
            record.account_preserved = true;
            record.account_disabled = true;
        }
    }
    record
}
