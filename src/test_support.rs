//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{TimeZone, Utc};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::client::{
    ApiError, ApiFuture, AvailabilityDomain, Image, ImagePage, Instance, InstanceAction,
    LaunchDetails, LifecycleState, ProviderApi, Vnic, VnicAttachment,
};

/// Scripted provider API that returns pre-seeded responses in FIFO order.
///
/// Each method pops its own queue; when a queue is down to its final
/// response, that response repeats so open-ended polling scenarios stay
/// deterministic. Every invocation is recorded for call-count assertions.
#[derive(Clone, Debug, Default)]
pub struct ScriptedApi {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    launches: Mutex<VecDeque<Result<Instance, ApiError>>>,
    instances: Mutex<VecDeque<Result<Instance, ApiError>>>,
    actions: Mutex<VecDeque<Result<Instance, ApiError>>>,
    terminations: Mutex<VecDeque<Result<(), ApiError>>>,
    image_pages: Mutex<VecDeque<Result<ImagePage, ApiError>>>,
    availability_domains: Mutex<VecDeque<Result<Vec<AvailabilityDomain>, ApiError>>>,
    vnic_attachments: Mutex<VecDeque<Result<Vec<VnicAttachment>, ApiError>>>,
    vnics: Mutex<VecDeque<Result<Vnic, ApiError>>>,
    invocations: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn pop_sticky<T: Clone>(queue: &Mutex<VecDeque<Result<T, ApiError>>>) -> Result<T, ApiError> {
    let mut queue = lock(queue);
    if queue.len() > 1 {
        if let Some(response) = queue.pop_front() {
            return response;
        }
    }
    if let Some(response) = queue.front() {
        return response.clone();
    }
    Err(ApiError::Transport {
        message: String::from("no scripted response available"),
    })
}

/// Builds an [`Instance`] in the given state.
#[must_use]
pub fn instance(id: &str, state: LifecycleState) -> Instance {
    Instance {
        id: id.to_owned(),
        lifecycle_state: state,
        display_name: None,
    }
}

/// Builds an [`Image`] with an RFC 3339 creation timestamp offset, so tests
/// can express "older than" without real clock reads.
#[must_use]
pub fn image(id: &str, display_name: &str, created_hour: u32) -> Image {
    Image {
        id: id.to_owned(),
        display_name: display_name.to_owned(),
        time_created: Utc
            .with_ymd_and_hms(2024, 1, 1, created_hour, 0, 0)
            .single()
            .unwrap_or_default(),
    }
}

impl ScriptedApi {
    /// Creates an API with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<String> {
        lock(&self.inner.invocations).clone()
    }

    fn count_invocations(&self, prefix: &str) -> usize {
        lock(&self.inner.invocations)
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    /// Number of `get_instance` calls made so far.
    #[must_use]
    pub fn get_instance_calls(&self) -> usize {
        self.count_invocations("get_instance")
    }

    /// Number of `list_images` calls made so far.
    #[must_use]
    pub fn list_images_calls(&self) -> usize {
        self.count_invocations("list_images")
    }

    /// Number of `launch_instance` calls made so far.
    #[must_use]
    pub fn launch_calls(&self) -> usize {
        self.count_invocations("launch_instance")
    }

    /// Number of power actions issued with the given action.
    #[must_use]
    pub fn action_calls(&self, action: InstanceAction) -> usize {
        self.count_invocations(&format!("instance_action {}", action.as_str()))
    }

    /// Queues a successful launch response.
    pub fn push_launch(&self, id: &str, state: LifecycleState) {
        lock(&self.inner.launches).push_back(Ok(instance(id, state)));
    }

    /// Queues a failing launch response.
    pub fn push_launch_error(&self, error: ApiError) {
        lock(&self.inner.launches).push_back(Err(error));
    }

    /// Queues a successful instance read.
    pub fn push_instance(&self, id: &str, state: LifecycleState) {
        lock(&self.inner.instances).push_back(Ok(instance(id, state)));
    }

    /// Queues a failing instance read.
    pub fn push_instance_error(&self, error: ApiError) {
        lock(&self.inner.instances).push_back(Err(error));
    }

    /// Queues a successful power-action response.
    pub fn push_action(&self, id: &str, state: LifecycleState) {
        lock(&self.inner.actions).push_back(Ok(instance(id, state)));
    }

    /// Queues a failing power-action response.
    pub fn push_action_error(&self, error: ApiError) {
        lock(&self.inner.actions).push_back(Err(error));
    }

    /// Queues a successful terminate response.
    pub fn push_terminate_ok(&self) {
        lock(&self.inner.terminations).push_back(Ok(()));
    }

    /// Queues one image page.
    pub fn push_image_page(&self, items: Vec<Image>, next_page: Option<&str>) {
        lock(&self.inner.image_pages).push_back(Ok(ImagePage {
            items,
            next_page: next_page.map(str::to_owned),
        }));
    }

    /// Queues a failing image-page read.
    pub fn push_image_page_error(&self, error: ApiError) {
        lock(&self.inner.image_pages).push_back(Err(error));
    }

    /// Queues an availability-domain listing.
    pub fn push_availability_domains(&self, names: &[&str]) {
        lock(&self.inner.availability_domains).push_back(Ok(names
            .iter()
            .map(|name| AvailabilityDomain {
                name: (*name).to_owned(),
            })
            .collect()));
    }

    /// Queues a VNIC attachment listing with one attachment.
    pub fn push_vnic_attachment(&self, vnic_id: &str) {
        lock(&self.inner.vnic_attachments).push_back(Ok(vec![VnicAttachment {
            vnic_id: Some(vnic_id.to_owned()),
        }]));
    }

    /// Queues an empty VNIC attachment listing.
    pub fn push_empty_vnic_attachments(&self) {
        lock(&self.inner.vnic_attachments).push_back(Ok(Vec::new()));
    }

    /// Queues a VNIC read.
    pub fn push_vnic(&self, public_ip: Option<&str>, private_ip: Option<&str>) {
        lock(&self.inner.vnics).push_back(Ok(Vnic {
            public_ip: public_ip.map(str::to_owned),
            private_ip: private_ip.map(str::to_owned),
        }));
    }

    fn record(&self, invocation: String) {
        lock(&self.inner.invocations).push(invocation);
    }
}

impl ProviderApi for ScriptedApi {
    fn launch_instance<'a>(&'a self, details: &'a LaunchDetails) -> ApiFuture<'a, Instance> {
        self.record(format!("launch_instance {}", details.display_name));
        let response = pop_sticky(&self.inner.launches);
        Box::pin(async move { response })
    }

    fn get_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, Instance> {
        self.record(format!("get_instance {instance_id}"));
        let response = pop_sticky(&self.inner.instances);
        Box::pin(async move { response })
    }

    fn instance_action<'a>(
        &'a self,
        instance_id: &'a str,
        action: InstanceAction,
    ) -> ApiFuture<'a, Instance> {
        self.record(format!("instance_action {} {instance_id}", action.as_str()));
        let response = pop_sticky(&self.inner.actions);
        Box::pin(async move { response })
    }

    fn terminate_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, ()> {
        self.record(format!("terminate_instance {instance_id}"));
        let response = pop_sticky(&self.inner.terminations);
        Box::pin(async move { response })
    }

    fn list_images<'a>(
        &'a self,
        compartment_id: &'a str,
        page: Option<&'a str>,
    ) -> ApiFuture<'a, ImagePage> {
        self.record(format!(
            "list_images {compartment_id} page={}",
            page.unwrap_or("-")
        ));
        let response = pop_sticky(&self.inner.image_pages);
        Box::pin(async move { response })
    }

    fn list_availability_domains<'a>(
        &'a self,
        compartment_id: &'a str,
    ) -> ApiFuture<'a, Vec<AvailabilityDomain>> {
        self.record(format!("list_availability_domains {compartment_id}"));
        let response = pop_sticky(&self.inner.availability_domains);
        Box::pin(async move { response })
    }

    fn list_vnic_attachments<'a>(
        &'a self,
        compartment_id: &'a str,
        instance_id: &'a str,
    ) -> ApiFuture<'a, Vec<VnicAttachment>> {
        self.record(format!(
            "list_vnic_attachments {compartment_id} {instance_id}"
        ));
        let response = pop_sticky(&self.inner.vnic_attachments);
        Box::pin(async move { response })
    }

    fn get_vnic<'a>(&'a self, vnic_id: &'a str) -> ApiFuture<'a, Vnic> {
        self.record(format!("get_vnic {vnic_id}"));
        let response = pop_sticky(&self.inner.vnics);
        Box::pin(async move { response })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }

}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Produces a provider-shaped instance JSON document.
#[must_use]
pub fn json_instance(id: &str, state: &str) -> String {
    format!("{{\"id\":\"{id}\",\"lifecycleState\":\"{state}\"}}")
}

/// Produces a provider-shaped image-list JSON document.
#[must_use]
pub fn json_images(images: &[(&str, &str, &str)]) -> String {
    let items = images
        .iter()
        .map(|(id, name, created)| {
            format!("{{\"id\":\"{id}\",\"displayName\":\"{name}\",\"timeCreated\":\"{created}\"}}")
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("[{items}]")
}

/// Produces a provider-shaped availability-domain list JSON document.
#[must_use]
pub fn json_availability_domains(names: &[&str]) -> String {
    let items = names
        .iter()
        .map(|name| format!("{{\"name\":\"{name}\"}}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("[{items}]")
}
