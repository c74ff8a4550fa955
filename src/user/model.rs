use crate::freeipa::types::{encode_datetime, Options, UserEntry};
use crate::user::state::{AccountState, LifecycleIntent};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// FreeIPA's login name pattern.
static UID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.][a-zA-Z0-9_.-]{0,252}[a-zA-Z0-9_.$-]?$")
        .expect("uid pattern compiles")
});

pub const AUTH_TYPES: [&str; 7] = [
    "password", "radius", "otp", "pkinit", "hardened", "idp", "passkey",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("Invalid login name '{0}'")]
    InvalidUid(String),

    #[error("{0} must not be empty")]
    MissingRequired(&'static str),

    #[error("{field} is not an RFC 3339 timestamp: '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("Unknown auth type '{0}'. Valid types: password, radius, otp, pkinit, hardened, idp, passkey")]
    InvalidAuthType(String),
}

pub fn validate_uid(uid: &str) -> Result<(), AttributeError> {
    if UID_PATTERN.is_match(uid) {
        Ok(())
    } else {
        Err(AttributeError::InvalidUid(uid.to_string()))
    }
}

/// Identity, contact and credential attributes. Passed to the directory
/// largely as-is; the directory owns their validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAttributes {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gecos: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_shell: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub krb_principal_name: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub krb_principal_expiration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub krb_password_expiration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userpassword: Option<String>,
    pub random_password: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid_number: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub email_address: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub telephone_numbers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mobile_numbers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pager_numbers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fax_numbers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organisation_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub car_license: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sshpubkeys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_certificates: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_class: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auth_type: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_proxy_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_proxy_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idp_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idp_user_id: Option<String>,
}

fn scalar(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |s| json!(s))
}

fn number(value: &Option<i64>) -> Value {
    value.map_or(Value::Null, |n| json!(n))
}

fn list(values: &[String]) -> Value {
    json!(values)
}

fn timestamp(field: &'static str, value: &Option<String>) -> Result<Value, AttributeError> {
    match value {
        None => Ok(Value::Null),
        Some(v) => encode_datetime(v).map_err(|_| AttributeError::InvalidTimestamp {
            field,
            value: v.clone(),
        }),
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(values) => values.is_empty(),
        _ => false,
    }
}

/// The value FreeIPA accepts to remove an attribute.
fn cleared(previous: &Value) -> Value {
    match previous {
        Value::Array(_) => json!([]),
        _ => json!(""),
    }
}

impl UserAttributes {
    pub fn validate(&self) -> Result<(), AttributeError> {
        if self.first_name.is_empty() {
            return Err(AttributeError::MissingRequired("first_name"));
        }
        if self.last_name.is_empty() {
            return Err(AttributeError::MissingRequired("last_name"));
        }
        if let Some(bad) = self.auth_type.iter().find(|t| !AUTH_TYPES.contains(&t.as_str())) {
            return Err(AttributeError::InvalidAuthType(bad.clone()));
        }
        self.option_values().map(|_| ())
    }

    /// Every settable attribute keyed by its FreeIPA option name. Absent
    /// values are `null` (scalars) or `[]` (lists).
    fn option_values(&self) -> Result<Vec<(&'static str, Value)>, AttributeError> {
        Ok(vec![
            ("givenname", json!(self.first_name)),
            ("sn", json!(self.last_name)),
            ("cn", scalar(&self.full_name)),
            ("displayname", scalar(&self.display_name)),
            ("initials", scalar(&self.initials)),
            ("homedirectory", scalar(&self.home_directory)),
            ("gecos", scalar(&self.gecos)),
            ("loginshell", scalar(&self.login_shell)),
            ("krbprincipalname", list(&self.krb_principal_name)),
            (
                "krbprincipalexpiration",
                timestamp("krb_principal_expiration", &self.krb_principal_expiration)?,
            ),
            (
                "krbpasswordexpiration",
                timestamp("krb_password_expiration", &self.krb_password_expiration)?,
            ),
            ("userpassword", scalar(&self.userpassword)),
            ("uidnumber", number(&self.uid_number)),
            ("gidnumber", number(&self.gid_number)),
            ("mail", list(&self.email_address)),
            ("telephonenumber", list(&self.telephone_numbers)),
            ("mobile", list(&self.mobile_numbers)),
            ("pager", list(&self.pager_numbers)),
            ("facsimiletelephonenumber", list(&self.fax_numbers)),
            ("street", scalar(&self.street_address)),
            ("l", scalar(&self.city)),
            ("st", scalar(&self.province)),
            ("postalcode", scalar(&self.postal_code)),
            ("ou", scalar(&self.organisation_unit)),
            ("title", scalar(&self.job_title)),
            ("manager", scalar(&self.manager)),
            ("employeenumber", scalar(&self.employee_number)),
            ("employeetype", scalar(&self.employee_type)),
            ("preferredlanguage", scalar(&self.preferred_language)),
            ("carlicense", list(&self.car_license)),
            ("ipasshpubkey", list(&self.sshpubkeys)),
            ("usercertificate", list(&self.user_certificates)),
            ("userclass", list(&self.user_class)),
            ("ipauserauthtype", list(&self.auth_type)),
            ("ipatokenradiusconfiglink", scalar(&self.radius_proxy_config)),
            ("ipatokenradiususername", scalar(&self.radius_proxy_username)),
            ("ipaidpconfiglink", scalar(&self.idp_config)),
            ("ipaidpsub", scalar(&self.idp_user_id)),
        ])
    }

    /// Options for `user_add` / `stageuser_add`: every present attribute.
    pub fn to_add_options(&self) -> Result<Options, AttributeError> {
        let mut options: Options = self
            .option_values()?
            .into_iter()
            .filter(|(_, value)| !is_absent(value))
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        if self.random_password {
            options.insert("random".to_string(), json!(true));
        }
        Ok(options)
    }

    /// Options for `user_mod` / `stageuser_mod`: only the attributes that
    /// differ from `prior`. Removed attributes are sent as empty values so the
    /// directory deletes them. An empty map means nothing changed.
    pub fn changes_from(&self, prior: &UserAttributes) -> Result<Options, AttributeError> {
        let old = prior.option_values()?;
        let new = self.option_values()?;
        let mut changes = Options::new();
        for ((key, old_value), (_, new_value)) in old.into_iter().zip(new) {
            if old_value == new_value {
                continue;
            }
            let value = if is_absent(&new_value) {
                cleared(&old_value)
            } else {
                new_value
            };
            changes.insert(key.to_string(), value);
        }
        Ok(changes)
    }

    /// Take the directory-assigned values from `prior` for every attribute
    /// this record leaves unset. The server fills these in on add (common
    /// name, home directory, id numbers, principal, default mail), so an unset
    /// value means "keep whatever the directory chose", not "remove it".
    pub fn fill_computed(&mut self, prior: &UserAttributes) {
        fn keep(value: &mut Option<String>, prior: &Option<String>) {
            if value.is_none() {
                value.clone_from(prior);
            }
        }
        fn keep_list(values: &mut Vec<String>, prior: &[String]) {
            if values.is_empty() {
                values.extend_from_slice(prior);
            }
        }

        keep(&mut self.full_name, &prior.full_name);
        keep(&mut self.display_name, &prior.display_name);
        keep(&mut self.initials, &prior.initials);
        keep(&mut self.gecos, &prior.gecos);
        keep(&mut self.home_directory, &prior.home_directory);
        keep(&mut self.login_shell, &prior.login_shell);
        if self.uid_number.is_none() {
            self.uid_number = prior.uid_number;
        }
        if self.gid_number.is_none() {
            self.gid_number = prior.gid_number;
        }
        keep_list(&mut self.krb_principal_name, &prior.krb_principal_name);
        keep_list(&mut self.email_address, &prior.email_address);
    }

    /// Rebuild attributes from a directory entry. Write-only values the
    /// directory never returns (password, random flag) are carried over from
    /// `previous`.
    pub fn from_entry(entry: &UserEntry, previous: Option<&UserAttributes>) -> Self {
        let int = |key: &str| entry.first(key).and_then(|v| v.parse::<i64>().ok());
        Self {
            first_name: entry.first("givenname").unwrap_or_default(),
            last_name: entry.first("sn").unwrap_or_default(),
            full_name: entry.first("cn"),
            display_name: entry.first("displayname"),
            initials: entry.first("initials"),
            home_directory: entry.first("homedirectory"),
            gecos: entry.first("gecos"),
            login_shell: entry.first("loginshell"),
            krb_principal_name: entry.all("krbprincipalname"),
            krb_principal_expiration: entry.datetime("krbprincipalexpiration"),
            krb_password_expiration: entry.datetime("krbpasswordexpiration"),
            userpassword: previous.and_then(|p| p.userpassword.clone()),
            random_password: previous.is_some_and(|p| p.random_password),
            uid_number: int("uidnumber"),
            gid_number: int("gidnumber"),
            email_address: entry.all("mail"),
            telephone_numbers: entry.all("telephonenumber"),
            mobile_numbers: entry.all("mobile"),
            pager_numbers: entry.all("pager"),
            fax_numbers: entry.all("facsimiletelephonenumber"),
            street_address: entry.first("street"),
            city: entry.first("l"),
            province: entry.first("st"),
            postal_code: entry.first("postalcode"),
            organisation_unit: entry.first("ou"),
            job_title: entry.first("title"),
            manager: entry.first("manager"),
            employee_number: entry.first("employeenumber"),
            employee_type: entry.first("employeetype"),
            preferred_language: entry.first("preferredlanguage"),
            car_license: entry.all("carlicense"),
            sshpubkeys: entry.all("ipasshpubkey"),
            user_certificates: entry.all("usercertificate"),
            user_class: entry.all("userclass"),
            auth_type: entry.all("ipauserauthtype"),
            radius_proxy_config: entry.first("ipatokenradiusconfiglink"),
            radius_proxy_username: entry.first("ipatokenradiususername"),
            idp_config: entry.first("ipaidpconfiglink"),
            idp_user_id: entry.first("ipaidpsub"),
        }
    }
}

/// The stored form of a managed user: one of the plan, state or config trees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub uid: String,
    /// Computed lifecycle state; unset in a plan until it has been resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AccountState>,
    #[serde(default)]
    pub account_disabled: bool,
    #[serde(default)]
    pub account_staged: bool,
    #[serde(default)]
    pub account_preserved: bool,
    #[serde(flatten)]
    pub attributes: UserAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

impl UserRecord {
    pub fn new(uid: impl Into<String>, first_name: &str, last_name: &str) -> Self {
        Self {
            uid: uid.into(),
            attributes: UserAttributes {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                ..UserAttributes::default()
            },
            ..Self::default()
        }
    }

    pub fn intent(&self) -> LifecycleIntent {
        LifecycleIntent::new(self.account_staged, self.account_preserved)
    }

    pub fn validate(&self) -> Result<(), AttributeError> {
        validate_uid(&self.uid)?;
        self.attributes.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserAttributes {
        UserAttributes {
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            email_address: vec!["alice@example.test".to_string()],
            job_title: Some("Engineer".to_string()),
            ..UserAttributes::default()
        }
    }

    #[test]
    fn test_fill_computed_keeps_directory_defaults() {
        let prior = UserAttributes {
            full_name: Some("Alice Liddell".to_string()),
            home_directory: Some("/home/alice".to_string()),
            uid_number: Some(1001),
            gid_number: Some(1001),
            krb_principal_name: vec!["alice@EXAMPLE.TEST".to_string()],
            email_address: vec!["alice@example.test".to_string()],
            ..alice()
        };
        let mut plan = UserAttributes {
            job_title: Some("Engineer".to_string()),
            login_shell: Some("/bin/zsh".to_string()),
            email_address: Vec::new(),
            ..alice()
        };
        plan.fill_computed(&prior);

        assert_eq!(plan.full_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(plan.uid_number, Some(1001));
        assert_eq!(plan.email_address, prior.email_address);
        assert_eq!(plan.login_shell.as_deref(), Some("/bin/zsh"));
        assert!(plan.changes_from(&prior).unwrap().contains_key("loginshell"));
        assert!(!plan.changes_from(&prior).unwrap().contains_key("cn"));
    }

    #[test]
    fn test_validate_uid() {
        assert!(validate_uid("alice").is_ok());
        assert!(validate_uid("svc.backup-01").is_ok());
        assert!(validate_uid("machine$").is_ok());
        assert!(validate_uid("").is_err());
        assert!(validate_uid("bad user").is_err());
        assert!(validate_uid("-leading").is_err());
    }

    #[test]
    fn test_add_options_skip_absent() {
        let mut attrs = alice();
        attrs.random_password = true;
        let options = attrs.to_add_options().unwrap();

        assert_eq!(options["givenname"], "Alice");
        assert_eq!(options["mail"], json!(["alice@example.test"]));
        assert_eq!(options["title"], "Engineer");
        assert_eq!(options["random"], true);
        assert!(!options.contains_key("cn"));
        assert!(!options.contains_key("telephonenumber"));
    }

    #[test]
    fn test_changes_only_include_diffs() {
        let prior = alice();
        assert!(prior.changes_from(&prior).unwrap().is_empty());

        let mut next = alice();
        next.job_title = None;
        next.email_address = vec![];
        next.city = Some("Oxford".to_string());
        next.uid_number = Some(1500);
        let changes = next.changes_from(&prior).unwrap();

        assert_eq!(changes.len(), 4);
        assert_eq!(changes["title"], "");
        assert_eq!(changes["mail"], json!([]));
        assert_eq!(changes["l"], "Oxford");
        assert_eq!(changes["uidnumber"], 1500);
    }

    #[test]
    fn test_attribute_validation() {
        let mut attrs = alice();
        attrs.auth_type = vec!["otp".to_string(), "sms".to_string()];
        assert_eq!(
            attrs.validate(),
            Err(AttributeError::InvalidAuthType("sms".to_string()))
        );

        let mut attrs = alice();
        attrs.krb_password_expiration = Some("tomorrow".to_string());
        assert!(matches!(
            attrs.validate(),
            Err(AttributeError::InvalidTimestamp { .. })
        ));

        let mut attrs = alice();
        attrs.last_name.clear();
        assert_eq!(
            attrs.validate(),
            Err(AttributeError::MissingRequired("last_name"))
        );
    }

    #[test]
    fn test_from_entry_keeps_write_only_fields() {
        let entry: UserEntry = serde_json::from_value(json!({
            "uid": ["alice"],
            "givenname": ["Alice"],
            "sn": ["Liddell"],
            "mail": ["alice@example.test"],
            "title": ["Engineer"],
            "uidnumber": ["1500"],
        }))
        .unwrap();

        let mut previous = alice();
        previous.userpassword = Some("Secret123".to_string());
        let attrs = UserAttributes::from_entry(&entry, Some(&previous));

        assert_eq!(attrs.uid_number, Some(1500));
        assert_eq!(attrs.userpassword.as_deref(), Some("Secret123"));
        assert_eq!(attrs.email_address, previous.email_address);
        assert_eq!(attrs.job_title, previous.job_title);
    }

    #[test]
    fn test_record_json_shape() {
        let record: UserRecord = serde_json::from_value(json!({
            "uid": "alice",
            "first_name": "Alice",
            "last_name": "Liddell",
            "account_staged": true,
        }))
        .unwrap();
        assert!(record.state.is_none());
        assert_eq!(record.intent(), LifecycleIntent::new(true, false));
        assert!(record.validate().is_ok());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["first_name"], "Alice");
        assert!(value.get("state").is_none());
    }
}
