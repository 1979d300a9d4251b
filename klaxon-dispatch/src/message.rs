//! Alarm payload construction.
//!
//! Every alarm is a high-priority push carrying a fixed notification and a
//! small data map the device uses to start ringing. The payload serializes to
//! the FCM HTTP v1 `messages:send` request body.

use chrono::{DateTime, Utc};
use klaxon_common::{AlertRequest, DeliveryToken, RecipientId};
use serde::{Deserialize, Serialize};

/// Fixed content of every alarm notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTemplate {
    #[serde(default = "defaults::title")]
    pub title: String,

    #[serde(default = "defaults::body")]
    pub body: String,

    /// Value of the `action` data key the device app switches on.
    #[serde(default = "defaults::action")]
    pub action: String,

    #[serde(default = "defaults::sound")]
    pub sound: String,

    /// iOS badge count.
    #[serde(default = "defaults::badge")]
    pub badge: u32,

    /// Android notification channel, if the app defines a dedicated one.
    #[serde(default)]
    pub android_channel_id: Option<String>,
}

impl Default for AlertTemplate {
    fn default() -> Self {
        Self {
            title: defaults::title(),
            body: defaults::body(),
            action: defaults::action(),
            sound: defaults::sound(),
            badge: defaults::badge(),
            android_channel_id: None,
        }
    }
}

mod defaults {
    pub fn title() -> String {
        "Emergency Alert".to_string()
    }

    pub fn body() -> String {
        "You have received an emergency alarm!".to_string()
    }

    pub fn action() -> String {
        "RING_ALARM".to_string()
    }

    pub fn sound() -> String {
        "default".to_string()
    }

    pub const fn badge() -> u32 {
        1
    }
}

/// A complete, ready-to-send alarm for one device.
///
/// The token is only reachable through serialization; `Debug` redacts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertPayload {
    message: Message,
    #[serde(skip)]
    target: RecipientId,
}

impl AlertPayload {
    /// Recipient this payload is addressed to.
    #[must_use]
    pub const fn target(&self) -> &RecipientId {
        &self.target
    }

    #[must_use]
    pub fn token(&self) -> &DeliveryToken {
        &self.message.token
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.message.android.notification.title
    }

    /// The `data` map delivered to the app.
    #[must_use]
    pub const fn data(&self) -> &AlertData {
        &self.message.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Message {
    token: DeliveryToken,
    data: AlertData,
    android: AndroidConfig,
    apns: ApnsConfig,
}

/// String-only data map, as required by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertData {
    pub action: String,
    /// Milliseconds since the Unix epoch, as a decimal string.
    pub timestamp: String,
    pub target_user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct AndroidConfig {
    priority: &'static str,
    notification: AndroidNotification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct AndroidNotification {
    title: String,
    body: String,
    sound: String,
    notification_priority: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ApnsConfig {
    headers: ApnsHeaders,
    payload: ApnsPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ApnsHeaders {
    #[serde(rename = "apns-priority")]
    priority: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ApnsPayload {
    aps: Aps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Aps {
    alert: ApsAlert,
    sound: String,
    badge: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ApsAlert {
    title: String,
    body: String,
}

/// Per-alarm inputs to the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertParams {
    pub title: String,
    pub body: String,
    pub target: RecipientId,
    pub timestamp: DateTime<Utc>,
}

/// Builds alarm payloads from a template.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    template: AlertTemplate,
}

impl MessageBuilder {
    #[must_use]
    pub const fn new(template: AlertTemplate) -> Self {
        Self { template }
    }

    #[must_use]
    pub const fn template(&self) -> &AlertTemplate {
        &self.template
    }

    /// Build the payload for `request`, addressed to `token`.
    #[must_use]
    pub fn build(&self, request: &AlertRequest, token: DeliveryToken) -> AlertPayload {
        self.build_at(&request.target, token, request.created_at)
    }

    /// Build a payload stamped with an explicit time.
    #[must_use]
    pub fn build_at(
        &self,
        target: &RecipientId,
        token: DeliveryToken,
        at: DateTime<Utc>,
    ) -> AlertPayload {
        let params = AlertParams {
            title: self.template.title.clone(),
            body: self.template.body.clone(),
            target: target.clone(),
            timestamp: at,
        };
        self.compose(token, params)
    }

    /// Build a payload from explicit parameters.
    ///
    /// The template still supplies the action, sound, badge and Android
    /// channel.
    #[must_use]
    pub fn compose(&self, token: DeliveryToken, params: AlertParams) -> AlertPayload {
        let template = &self.template;
        let AlertParams {
            title,
            body,
            target,
            timestamp,
        } = params;

        AlertPayload {
            message: Message {
                token,
                data: AlertData {
                    action: template.action.clone(),
                    timestamp: timestamp.timestamp_millis().to_string(),
                    target_user_id: target.to_string(),
                },
                android: AndroidConfig {
                    priority: "high",
                    notification: AndroidNotification {
                        title: title.clone(),
                        body: body.clone(),
                        sound: template.sound.clone(),
                        notification_priority: "PRIORITY_HIGH",
                        channel_id: template.android_channel_id.clone(),
                    },
                },
                apns: ApnsConfig {
                    headers: ApnsHeaders { priority: "10" },
                    payload: ApnsPayload {
                        aps: Aps {
                            alert: ApsAlert { title, body },
                            sound: template.sound.clone(),
                            badge: template.badge,
                        },
                    },
                },
            },
            target,
        }
    }
}
