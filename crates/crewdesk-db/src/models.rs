//! Database row types mapping directly to SQLite rows.
//! Distinct from crewdesk-types API models to keep the DB layer independent.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crewdesk_types::api::{ChannelResponse, MessageResponse, ProjectResponse};
use crewdesk_types::models::Role;

pub struct ProfileRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub tier: String,
    pub created_at: String,
}

pub struct ChannelRow {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub created_by: String,
    pub created_at: String,
}

/// Message row with the author's display fields joined in.
pub struct MessageRow {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub created_at: String,
}

impl ChannelRow {
    pub fn into_response(self) -> ChannelResponse {
        ChannelResponse {
            id: parse_uuid(&self.id, "channel id", &self.id),
            created_by: parse_uuid(&self.created_by, "created_by", &self.id),
            created_at: parse_timestamp(&self.created_at, &self.id),
            name: self.name,
            domain: self.domain,
        }
    }
}

impl MessageRow {
    /// Convert a stored row into the API shape shared by the history
    /// endpoint and the gateway's HistoryBatch. Corrupt ids or timestamps
    /// are logged and replaced with defaults rather than failing the whole
    /// history load.
    pub fn into_response(self) -> MessageResponse {
        MessageResponse {
            id: parse_uuid(&self.id, "message id", &self.id),
            channel_id: parse_uuid(&self.channel_id, "channel_id", &self.id),
            author_id: parse_uuid(&self.author_id, "author_id", &self.id),
            author_name: self.author_name,
            author_avatar_url: self.author_avatar_url,
            content: self.content,
            created_at: parse_timestamp(&self.created_at, &self.id),
        }
    }
}

fn parse_uuid(value: &str, what: &str, row_id: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row '{}': {}", what, value, row_id, e);
        Uuid::default()
    })
}

fn parse_timestamp(value: &str, row_id: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on row '{}': {}", value, row_id, e);
            DateTime::default()
        })
}

/// Project row joined with the caller's membership role.
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub role: String,
    pub created_at: String,
}

impl ProjectRow {
    pub fn into_response(self) -> ProjectResponse {
        ProjectResponse {
            id: parse_uuid(&self.id, "project id", &self.id),
            role: self.role.parse().unwrap_or_else(|e| {
                warn!("Corrupt role on project '{}': {}", self.id, e);
                Role::Member
            }),
            created_at: parse_timestamp(&self.created_at, &self.id),
            name: self.name,
            domain: self.domain,
        }
    }
}

pub struct SubscriptionRow {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: String,
    pub created_at: String,
}
