//! Admin API DTOs
//!
//! The backend is loose about envelopes and optional fields, so every
//! response type defaults missing fields instead of failing the page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload either bare or wrapped as `{ "data": ... }` (with or without
/// `success`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

/// Headline numbers on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: u64,
    pub active_users: u64,
    pub new_users_today: u64,
    pub total_matches: u64,
    pub total_messages: u64,
    pub open_tickets: u64,
    pub premium_users: u64,
}

/// `GET /api/admin/users/online`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OnlineCount {
    #[serde(alias = "online")]
    pub count: u64,
}

/// User as listed in the admin tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    pub status: Option<String>,
    pub role: Option<String>,
    pub is_online: bool,
    pub is_premium: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_active: Option<DateTime<Utc>>,
}

/// Someone currently connected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LiveUser {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    pub location: Option<String>,
    pub device: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_active: Option<DateTime<Utc>>,
}

/// One page of a list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Paginated<T> {
    #[serde(alias = "users", alias = "items", alias = "results")]
    pub data: Vec<T>,
    #[serde(alias = "totalCount")]
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            page: 1,
            limit: 0,
            total_pages: 0,
        }
    }
}

impl<T> Paginated<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Filter values accepted by the user list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Banned,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Banned => "banned",
            UserStatus::Suspended => "suspended",
        }
    }
}

/// Parameters of `GET /api/admin/users`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub status: Option<UserStatus>,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            search: None,
            status: None,
        }
    }
}

impl UserQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        let search = search.trim();
        self.search = if search.is_empty() { None } else { Some(search.to_string()) };
        self
    }

    pub fn with_status(mut self, status: Option<UserStatus>) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("page", self.page.to_string()), ("limit", self.limit.to_string())];
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        if let Some(status) = self.status {
            params.push(("status", status.as_str().to_string()));
        }
        params
    }
}

/// Tracking summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackingStats {
    pub total_sessions: u64,
    pub active_sessions: u64,
    pub average_session_seconds: f64,
    pub page_views: u64,
    pub unique_visitors: u64,
}

/// Window for tracking analytics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyticsRange {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl AnalyticsRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsRange::Day => "24h",
            AnalyticsRange::Week => "7d",
            AnalyticsRange::Month => "30d",
        }
    }
}

/// One point of an analytics series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsPoint {
    pub label: String,
    pub sessions: u64,
    pub page_views: u64,
    pub unique_visitors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackingAnalytics {
    pub range: Option<String>,
    pub series: Vec<AnalyticsPoint>,
    pub top_pages: Vec<PageCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageCount {
    pub path: String,
    pub views: u64,
}

/// Per-user tracking row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackedUser {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    pub sessions: u64,
    pub total_seconds: u64,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Conversation {
    #[serde(alias = "_id")]
    pub id: String,
    pub participants: Vec<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(alias = "_id")]
    pub id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupportTicket {
    #[serde(alias = "_id")]
    pub id: String,
    pub subject: String,
    pub status: String,
    pub priority: Option<String>,
    pub user_email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailCampaign {
    #[serde(alias = "_id")]
    pub id: String,
    pub subject: String,
    pub status: String,
    pub recipients: u64,
    pub sent: u64,
    pub failed: u64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Who a bulk email goes to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    All,
    Active,
    Inactive,
    Premium,
}

/// `POST /api/admin/email/campaigns`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEmailRequest {
    pub subject: String,
    pub body: String,
    pub audience: Audience,
}

impl BulkEmailRequest {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            audience: Audience::default(),
        }
    }

    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.audience = audience;
        self
    }
}
