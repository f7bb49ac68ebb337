//! Typed directory records and the Graph calls behind the bulk commands.
//!
//! Covers users, groups, BitLocker recovery keys, OneDrive drives, and
//! mailbox inbox rules. Each list call selects only the fields the exports
//! actually use.

use crate::error::Result;
use crate::graph::GraphClient;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub user_principal_name: Option<String>,
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub account_enabled: Option<bool>,
    pub user_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub security_enabled: Option<bool>,
    #[serde(default)]
    pub group_types: Vec<String>,
}

/// Recovery key metadata as returned by the collection endpoint. The `key`
/// property itself is only returned by a per-key read.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitlockerKeyInfo {
    pub id: String,
    pub created_date_time: Option<String>,
    pub device_id: Option<String>,
    pub volume_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitlockerKey {
    pub id: String,
    pub key: Option<String>,
    pub device_id: Option<String>,
    pub created_date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveInfo {
    pub id: String,
    pub web_url: Option<String>,
    pub drive_type: Option<String>,
    pub quota: Option<DriveQuota>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveQuota {
    pub total: Option<i64>,
    pub used: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRule {
    pub id: String,
    pub display_name: Option<String>,
    pub is_enabled: Option<bool>,
    pub actions: Option<MessageRuleActions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRuleActions {
    #[serde(default)]
    pub forward_to: Vec<Recipient>,
    #[serde(default)]
    pub forward_as_attachment_to: Vec<Recipient>,
    #[serde(default)]
    pub redirect_to: Vec<Recipient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: Option<EmailAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    pub address: Option<String>,
}

impl MessageRule {
    /// Addresses this rule forwards or redirects mail to.
    pub fn forward_targets(&self) -> Vec<String> {
        let Some(actions) = &self.actions else {
            return Vec::new();
        };

        actions
            .forward_to
            .iter()
            .chain(&actions.forward_as_attachment_to)
            .chain(&actions.redirect_to)
            .filter_map(|r| r.email_address.as_ref())
            .filter_map(|e| e.address.clone())
            .collect()
    }
}

pub async fn list_users(client: &GraphClient) -> Result<Vec<User>> {
    client
        .get_all_pages(
            "users?$select=id,userPrincipalName,displayName,mail,accountEnabled,userType",
        )
        .await
}

pub async fn list_groups(client: &GraphClient) -> Result<Vec<Group>> {
    client
        .get_all_pages("groups?$select=id,displayName,mail,securityEnabled,groupTypes")
        .await
}

pub async fn list_bitlocker_keys(client: &GraphClient) -> Result<Vec<BitlockerKeyInfo>> {
    client
        .get_all_pages_beta("informationProtection/bitlocker/recoveryKeys")
        .await
}

/// Read one recovery key including the key material. Audited by Entra ID on
/// every call, which is why the backup fetches keys one at a time through
/// the paced runner.
pub async fn get_bitlocker_key(client: &GraphClient, key_id: &str) -> Result<BitlockerKey> {
    client
        .get_beta(&format!(
            "informationProtection/bitlocker/recoveryKeys/{}?$select=key,deviceId,createdDateTime,id",
            key_id
        ))
        .await
}

/// Fetch a user's default drive. For an unprovisioned but licensed user the
/// first request triggers provisioning and typically fails until SharePoint
/// finishes, so callers run this through the retry wrapper.
pub async fn get_user_drive(client: &GraphClient, user: &str) -> Result<DriveInfo> {
    client.get(&format!("users/{}/drive", user)).await
}

pub async fn list_inbox_rules(client: &GraphClient, user: &str) -> Result<Vec<MessageRule>> {
    client
        .get_all_pages(&format!("users/{}/mailFolders/inbox/messageRules", user))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_targets_span_all_action_lists() {
        let rule: MessageRule = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "displayName": "exfil",
            "isEnabled": true,
            "actions": {
                "forwardTo": [{"emailAddress": {"address": "a@evil.test"}}],
                "redirectTo": [{"emailAddress": {"address": "b@evil.test"}}]
            }
        }))
        .unwrap();

        assert_eq!(rule.forward_targets(), vec!["a@evil.test", "b@evil.test"]);
    }

    #[test]
    fn rule_without_actions_has_no_targets() {
        let rule: MessageRule =
            serde_json::from_value(serde_json::json!({"id": "r2"})).unwrap();
        assert!(rule.forward_targets().is_empty());
    }
}
