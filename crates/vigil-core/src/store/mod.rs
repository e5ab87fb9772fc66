// ── Domain caches ──
//
// Everything the router writes and the console reads: one merge cache per
// record type plus the policy books. Owned by the session and shared with
// the subscription router through an `Arc`.

mod cache;
mod policy_book;

pub use cache::{MergeCache, MergePolicy, MergeStats};
pub use policy_book::PolicyBook;

use crate::model::{Camera, CameraAlert, CameraPolicy, Digest, Incident, NewsItem, Sensor, SensorPolicy};

/// Feed capacities.
pub const INCIDENT_CAPACITY: usize = 200;
pub const NEWS_CAPACITY: usize = 200;
pub const DIGEST_CAPACITY: usize = 300;
pub const CAMERA_ALERT_CAPACITY: usize = 200;

/// The set of caches for one session.
pub struct DomainCaches {
    sensors: MergeCache<Sensor>,
    cameras: MergeCache<Camera>,
    incidents: MergeCache<Incident>,
    news: MergeCache<NewsItem>,
    digests: MergeCache<Digest>,
    camera_alerts: MergeCache<CameraAlert>,
    sensor_policies: PolicyBook<SensorPolicy>,
    camera_policies: PolicyBook<CameraPolicy>,
}

impl Default for DomainCaches {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainCaches {
    pub fn new() -> Self {
        Self {
            sensors: MergeCache::upsert(),
            cameras: MergeCache::upsert(),
            incidents: MergeCache::dedup_prepend(INCIDENT_CAPACITY),
            news: MergeCache::dedup_prepend(NEWS_CAPACITY),
            digests: MergeCache::dedup_prepend(DIGEST_CAPACITY),
            camera_alerts: MergeCache::dedup_prepend(CAMERA_ALERT_CAPACITY),
            sensor_policies: PolicyBook::new(),
            camera_policies: PolicyBook::new(),
        }
    }

    pub fn sensors(&self) -> &MergeCache<Sensor> {
        &self.sensors
    }

    pub fn cameras(&self) -> &MergeCache<Camera> {
        &self.cameras
    }

    pub fn incidents(&self) -> &MergeCache<Incident> {
        &self.incidents
    }

    pub fn news(&self) -> &MergeCache<NewsItem> {
        &self.news
    }

    pub fn digests(&self) -> &MergeCache<Digest> {
        &self.digests
    }

    pub fn camera_alerts(&self) -> &MergeCache<CameraAlert> {
        &self.camera_alerts
    }

    pub fn sensor_policies(&self) -> &PolicyBook<SensorPolicy> {
        &self.sensor_policies
    }

    pub fn camera_policies(&self) -> &PolicyBook<CameraPolicy> {
        &self.camera_policies
    }

    /// Empty every cache and policy book (logout).
    pub fn clear(&self) {
        self.sensors.clear();
        self.cameras.clear();
        self.incidents.clear();
        self.news.clear();
        self.digests.clear();
        self.camera_alerts.clear();
        self.sensor_policies.clear();
        self.camera_policies.clear();
    }
}
