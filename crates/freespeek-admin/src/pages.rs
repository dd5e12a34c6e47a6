//! Page-level controllers
//!
//! Each page owns the [`PollingResource`]s it shows. Mounting starts them at
//! the configured intervals and binds them to the session: once the session
//! settles as signed out, every resource of the page stops. Dropping the page
//! (or calling `unmount`) stops them too.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::admin::{
    AdminUser, AnalyticsRange, Conversation, DashboardStats, EmailCampaign, LiveUser, Paginated,
    SupportTicket, TrackedUser, TrackingAnalytics, TrackingStats, UserQuery, UserStatus,
};
use crate::client::ApiClient;
use crate::polling::{FetchOutcome, PendingFetch, PollHandle, PollingResource};
use crate::session::SessionStatus;

/// Intervals and limits for the page resources. A zero interval means
/// fetch on mount and on demand only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSettings {
    pub dashboard_interval: Duration,
    pub live_users_interval: Duration,
    pub tracking_interval: Duration,
    /// Users, chats, support and email lists
    pub list_interval: Duration,
    pub fetch_timeout: Duration,
    pub page_size: u32,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            dashboard_interval: Duration::from_millis(5_000),
            live_users_interval: Duration::from_millis(10_000),
            tracking_interval: Duration::from_millis(30_000),
            list_interval: Duration::ZERO,
            fetch_timeout: crate::polling::DEFAULT_FETCH_TIMEOUT,
            page_size: 20,
        }
    }
}

/// Running timers of one page plus the task that stops them on sign-out
struct Mount {
    handles: Vec<PollHandle>,
    guard: JoinHandle<()>,
}

impl Mount {
    fn new<F>(page: &'static str, handles: Vec<PollHandle>, mut session: watch::Receiver<SessionStatus>, stop: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = tokio::spawn(async move {
            let signed_out = session
                .wait_for(|status| !status.is_loading && !status.is_authenticated())
                .await
                .is_ok();
            if signed_out {
                debug!(page, "Session ended, stopping page resources");
                stop();
            }
        });
        Self { handles, guard }
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.guard.abort();
        self.handles.clear();
    }
}

fn resource<T, F, Fut>(name: &str, settings: &PageSettings, fetcher: F) -> PollingResource<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = crate::Result<T>> + Send + 'static,
{
    PollingResource::with_timeout(name, settings.fetch_timeout, fetcher)
}

async fn join_all(pending: Vec<PendingFetch>) -> Vec<FetchOutcome> {
    future::join_all(pending).await
}

/// Headline stats and the online counter
pub struct DashboardPage {
    pub stats: PollingResource<DashboardStats>,
    pub online: PollingResource<u64>,
    _mount: Mount,
}

impl DashboardPage {
    pub fn mount(client: &ApiClient, settings: &PageSettings, session: watch::Receiver<SessionStatus>) -> Self {
        let stats = resource("dashboard_stats", settings, {
            let client = client.clone();
            move || {
                let client = client.clone();
                async move { client.dashboard_stats().await }
            }
        });
        let online = resource("online_users", settings, {
            let client = client.clone();
            move || {
                let client = client.clone();
                async move { client.online_user_count().await }
            }
        });

        let handles = vec![
            stats.start(settings.dashboard_interval),
            online.start(settings.dashboard_interval),
        ];
        let mount = Mount::new("dashboard", handles, session, {
            let (stats, online) = (stats.clone(), online.clone());
            move || {
                stats.stop();
                online.stop();
            }
        });

        Self { stats, online, _mount: mount }
    }

    pub async fn refresh(&self) -> Vec<FetchOutcome> {
        join_all(vec![self.stats.refresh(), self.online.refresh()]).await
    }

    /// Stop every resource of the page. Same as dropping it.
    pub fn unmount(self) {}
}

pub struct LiveUsersPage {
    pub users: PollingResource<Vec<LiveUser>>,
    _mount: Mount,
}

impl LiveUsersPage {
    pub fn mount(client: &ApiClient, settings: &PageSettings, session: watch::Receiver<SessionStatus>) -> Self {
        let users = resource("live_users", settings, {
            let client = client.clone();
            move || {
                let client = client.clone();
                async move { client.live_users().await }
            }
        });

        let handles = vec![users.start(settings.live_users_interval)];
        let mount = Mount::new("live_users", handles, session, {
            let users = users.clone();
            move || users.stop()
        });

        Self { users, _mount: mount }
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.users.refresh().await
    }

    pub fn unmount(self) {}
}

/// Tracking stats, analytics for a selectable range and a paginated user
/// table
pub struct TrackingPage {
    pub stats: PollingResource<TrackingStats>,
    pub analytics: PollingResource<TrackingAnalytics>,
    pub users: PollingResource<Paginated<TrackedUser>>,
    range: Arc<RwLock<AnalyticsRange>>,
    users_page: Arc<AtomicU32>,
    _mount: Mount,
}

impl TrackingPage {
    pub fn mount(client: &ApiClient, settings: &PageSettings, session: watch::Receiver<SessionStatus>) -> Self {
        let range = Arc::new(RwLock::new(AnalyticsRange::default()));
        let users_page = Arc::new(AtomicU32::new(1));
        let limit = settings.page_size;

        let stats = resource("tracking_stats", settings, {
            let client = client.clone();
            move || {
                let client = client.clone();
                async move { client.tracking_stats().await }
            }
        });
        let analytics = resource("tracking_analytics", settings, {
            let client = client.clone();
            let range = range.clone();
            move || {
                let client = client.clone();
                let range = *range.read();
                async move { client.tracking_analytics(range).await }
            }
        });
        let users = resource("tracking_users", settings, {
            let client = client.clone();
            let users_page = users_page.clone();
            move || {
                let client = client.clone();
                let page = users_page.load(Ordering::Relaxed);
                async move { client.tracking_users(page, limit).await }
            }
        });

        let handles = vec![
            stats.start(settings.tracking_interval),
            analytics.start(settings.tracking_interval),
            users.start(settings.tracking_interval),
        ];
        let mount = Mount::new("tracking", handles, session, {
            let (stats, analytics, users) = (stats.clone(), analytics.clone(), users.clone());
            move || {
                stats.stop();
                analytics.stop();
                users.stop();
            }
        });

        Self {
            stats,
            analytics,
            users,
            range,
            users_page,
            _mount: mount,
        }
    }

    pub fn range(&self) -> AnalyticsRange {
        *self.range.read()
    }

    /// Switch the analytics window; the fetch for the old window is dropped
    pub fn set_range(&self, range: AnalyticsRange) -> PendingFetch {
        *self.range.write() = range;
        self.analytics.supersede()
    }

    pub fn set_users_page(&self, page: u32) -> PendingFetch {
        self.users_page.store(page.max(1), Ordering::Relaxed);
        self.users.supersede()
    }

    pub async fn refresh(&self) -> Vec<FetchOutcome> {
        join_all(vec![
            self.stats.refresh(),
            self.analytics.refresh(),
            self.users.refresh(),
        ])
        .await
    }

    pub fn unmount(self) {}
}

/// Searchable, filterable user table
pub struct UsersPage {
    pub users: PollingResource<Paginated<AdminUser>>,
    query: Arc<RwLock<UserQuery>>,
    _mount: Mount,
}

impl UsersPage {
    pub fn mount(client: &ApiClient, settings: &PageSettings, session: watch::Receiver<SessionStatus>) -> Self {
        let query = Arc::new(RwLock::new(UserQuery::new(settings.page_size)));

        let users = resource("users", settings, {
            let client = client.clone();
            let query = query.clone();
            move || {
                let client = client.clone();
                let query = query.read().clone();
                async move { client.list_users(&query).await }
            }
        });

        let handles = vec![users.start(settings.list_interval)];
        let mount = Mount::new("users", handles, session, {
            let users = users.clone();
            move || users.stop()
        });

        Self { users, query, _mount: mount }
    }

    pub fn query(&self) -> UserQuery {
        self.query.read().clone()
    }

    /// Replace the query and fetch with it. Whatever was in flight for the
    /// previous query is discarded when it lands.
    pub fn set_query(&self, query: UserQuery) -> PendingFetch {
        *self.query.write() = query;
        self.users.supersede()
    }

    pub fn set_page(&self, page: u32) -> PendingFetch {
        self.set_query(self.query().with_page(page))
    }

    /// New search text; back to the first page
    pub fn set_search(&self, search: &str) -> PendingFetch {
        self.set_query(self.query().with_search(search).with_page(1))
    }

    pub fn set_status(&self, status: Option<UserStatus>) -> PendingFetch {
        self.set_query(self.query().with_status(status).with_page(1))
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.users.refresh().await
    }

    pub fn unmount(self) {}
}

pub struct ChatsPage {
    pub conversations: PollingResource<Paginated<Conversation>>,
    page: Arc<AtomicU32>,
    _mount: Mount,
}

impl ChatsPage {
    pub fn mount(client: &ApiClient, settings: &PageSettings, session: watch::Receiver<SessionStatus>) -> Self {
        let page = Arc::new(AtomicU32::new(1));
        let limit = settings.page_size;

        let conversations = resource("chats", settings, {
            let client = client.clone();
            let page = page.clone();
            move || {
                let client = client.clone();
                let page = page.load(Ordering::Relaxed);
                async move { client.chats(page, limit).await }
            }
        });

        let handles = vec![conversations.start(settings.list_interval)];
        let mount = Mount::new("chats", handles, session, {
            let conversations = conversations.clone();
            move || conversations.stop()
        });

        Self {
            conversations,
            page,
            _mount: mount,
        }
    }

    pub fn set_page(&self, page: u32) -> PendingFetch {
        self.page.store(page.max(1), Ordering::Relaxed);
        self.conversations.supersede()
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.conversations.refresh().await
    }

    pub fn unmount(self) {}
}

pub struct SupportPage {
    pub tickets: PollingResource<Vec<SupportTicket>>,
    status: Arc<RwLock<Option<String>>>,
    _mount: Mount,
}

impl SupportPage {
    pub fn mount(client: &ApiClient, settings: &PageSettings, session: watch::Receiver<SessionStatus>) -> Self {
        let status: Arc<RwLock<Option<String>>> = Arc::new(RwLock::new(None));

        let tickets = resource("support_tickets", settings, {
            let client = client.clone();
            let status = status.clone();
            move || {
                let client = client.clone();
                let status = status.read().clone();
                async move { client.support_tickets(status.as_deref()).await }
            }
        });

        let handles = vec![tickets.start(settings.list_interval)];
        let mount = Mount::new("support", handles, session, {
            let tickets = tickets.clone();
            move || tickets.stop()
        });

        Self {
            tickets,
            status,
            _mount: mount,
        }
    }

    pub fn set_status(&self, status: Option<&str>) -> PendingFetch {
        *self.status.write() = status.map(str::to_string);
        self.tickets.supersede()
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.tickets.refresh().await
    }

    pub fn unmount(self) {}
}

pub struct EmailPage {
    pub campaigns: PollingResource<Vec<EmailCampaign>>,
    client: ApiClient,
    _mount: Mount,
}

impl EmailPage {
    pub fn mount(client: &ApiClient, settings: &PageSettings, session: watch::Receiver<SessionStatus>) -> Self {
        let campaigns = resource("email_campaigns", settings, {
            let client = client.clone();
            move || {
                let client = client.clone();
                async move { client.email_campaigns().await }
            }
        });

        let handles = vec![campaigns.start(settings.list_interval)];
        let mount = Mount::new("email", handles, session, {
            let campaigns = campaigns.clone();
            move || campaigns.stop()
        });

        Self {
            campaigns,
            client: client.clone(),
            _mount: mount,
        }
    }

    /// Send a campaign, then reload the list so it shows up
    pub async fn send(&self, request: &crate::admin::BulkEmailRequest) -> crate::Result<EmailCampaign> {
        let campaign = self.client.send_bulk_email(request).await?;
        self.campaigns.supersede().await;
        Ok(campaign)
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.campaigns.refresh().await
    }

    pub fn unmount(self) {}
}
