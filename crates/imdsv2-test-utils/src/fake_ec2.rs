//! Scripted in-memory EC2 account
//!
//! [`FakeAccount`] holds the state of every region and hands out per-region
//! [`FakeEc2`] clients through [`RegionClients`]. Failures are scripted per
//! region or per instance, and every call is recorded with a timestamp from
//! `tokio::time`, so tests running with paused time can assert on pacing.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use aws_sdk_ec2::types::{
    HttpTokensState, Instance, InstanceMetadataEndpointState, InstanceMetadataOptionsResponse,
    InstanceState, InstanceStateName, Region, Tag,
};
use imdsv2_common::{ApiError, ApplyState, TokenMode};
use imdsv2_enforcer::aws::{Ec2Api, InstancePage, RegionClients};
use tokio::time::Instant;

/// One instance held by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeInstance {
    pub instance_id: Option<String>,
    pub state: String,
    pub name: Option<String>,
    /// `None` omits `MetadataOptions` from the response entirely
    pub http_tokens: Option<TokenMode>,
}

impl FakeInstance {
    pub fn new(instance_id: &str) -> Self {
        Self {
            instance_id: Some(instance_id.to_string()),
            state: "running".to_string(),
            name: None,
            http_tokens: Some(TokenMode::Optional),
        }
    }

    /// An instance the provider returns without an ID
    pub fn anonymous() -> Self {
        Self {
            instance_id: None,
            ..Self::new("")
        }
    }

    pub fn tokens(mut self, mode: Option<TokenMode>) -> Self {
        self.http_tokens = mode;
        self
    }

    pub fn required(self) -> Self {
        self.tokens(Some(TokenMode::Required))
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn state(mut self, state: &str) -> Self {
        self.state = state.to_string();
        self
    }

    fn to_sdk(&self) -> Instance {
        let mut builder = Instance::builder()
            .set_instance_id(self.instance_id.clone())
            .state(
                InstanceState::builder()
                    .name(InstanceStateName::from(self.state.as_str()))
                    .build(),
            );
        if let Some(name) = &self.name {
            builder = builder.tags(Tag::builder().key("Name").value(name).build());
        }
        if let Some(mode) = &self.http_tokens {
            builder = builder.metadata_options(
                InstanceMetadataOptionsResponse::builder()
                    .http_tokens(HttpTokensState::from(mode.as_str()))
                    .http_endpoint(InstanceMetadataEndpointState::Enabled)
                    .build(),
            );
        }
        builder.build()
    }
}

/// A call observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    DescribeRegions { dry_run: bool },
    DescribeInstances { next_token: Option<String> },
    GetDefaults,
    ModifyInstance { instance_id: String },
    ModifyDefaults,
}

/// Account-wide API surfaces whose concurrency is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    DescribeInstances,
    GetDefaults,
    ModifyDefaults,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub region: String,
    pub kind: CallKind,
    pub at: Instant,
}

#[derive(Debug)]
struct RegionState {
    instances: Vec<FakeInstance>,
    default_tokens: Option<TokenMode>,
    /// Fail the scan when this page index (0-based) is requested
    scan_failure: Option<(usize, ApiError)>,
    defaults_read_failure: Option<ApiError>,
    defaults_write_failure: Option<ApiError>,
    defaults_ack: bool,
    instance_failures: HashMap<String, VecDeque<ApiError>>,
    apply_state: ApplyState,
    in_flight_modifies: usize,
    max_in_flight_modifies: usize,
}

impl RegionState {
    fn new() -> Self {
        Self {
            instances: Vec::new(),
            default_tokens: None,
            scan_failure: None,
            defaults_read_failure: None,
            defaults_write_failure: None,
            defaults_ack: true,
            instance_failures: HashMap::new(),
            apply_state: ApplyState::Applied,
            in_flight_modifies: 0,
            max_in_flight_modifies: 0,
        }
    }
}

#[derive(Debug)]
struct AccountState {
    /// Extra regions returned by DescribeRegions with the given opt-in status
    listed_regions: Vec<(String, Option<String>)>,
    regions: BTreeMap<String, RegionState>,
    describe_regions_failure: Option<ApiError>,
    dry_run_error: ApiError,
    page_size: usize,
    latency: Duration,
    calls: Vec<Call>,
    regions_mutating: usize,
    max_regions_mutating: usize,
    in_flight: HashMap<ApiCall, usize>,
    peak_in_flight: HashMap<ApiCall, usize>,
}

/// Scripted EC2 account shared by every per-region client
#[derive(Debug, Clone)]
pub struct FakeAccount {
    state: Arc<Mutex<AccountState>>,
}

impl Default for FakeAccount {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAccount {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AccountState {
                listed_regions: Vec::new(),
                regions: BTreeMap::new(),
                describe_regions_failure: None,
                dry_run_error: ApiError::new(
                    "DryRunOperation",
                    "Request would have succeeded, but DryRun flag is set.",
                ),
                page_size: 1000,
                latency: Duration::ZERO,
                calls: Vec::new(),
                regions_mutating: 0,
                max_regions_mutating: 0,
                in_flight: HashMap::new(),
                peak_in_flight: HashMap::new(),
            })),
        }
    }

    /// Account with the given enabled regions and nothing in them
    pub fn with_regions(regions: &[&str]) -> Self {
        let account = Self::new();
        for region in regions {
            account.add_region(region);
        }
        account
    }

    fn lock(&self) -> MutexGuard<'_, AccountState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_region<T>(&self, region: &str, f: impl FnOnce(&mut RegionState) -> T) -> T {
        let mut state = self.lock();
        f(state
            .regions
            .entry(region.to_string())
            .or_insert_with(RegionState::new))
    }

    /// Enable a region (opt-in status `opt-in-not-required`)
    pub fn add_region(&self, region: &str) -> &Self {
        self.list_region(region, Some("opt-in-not-required"));
        self.with_region(region, |_| ());
        self
    }

    /// Make DescribeRegions return `region` with `opt_in_status`
    pub fn list_region(&self, region: &str, opt_in_status: Option<&str>) -> &Self {
        self.lock()
            .listed_regions
            .push((region.to_string(), opt_in_status.map(str::to_string)));
        self
    }

    pub fn add_instance(&self, region: &str, instance: FakeInstance) -> &Self {
        self.with_region(region, |r| r.instances.push(instance));
        self
    }

    pub fn set_default(&self, region: &str, mode: Option<TokenMode>) -> &Self {
        self.with_region(region, |r| r.default_tokens = mode);
        self
    }

    pub fn set_page_size(&self, page_size: usize) -> &Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Delay every call by `latency` so concurrent calls overlap
    pub fn set_latency(&self, latency: Duration) -> &Self {
        self.lock().latency = latency;
        self
    }

    pub fn fail_describe_regions(&self, error: ApiError) -> &Self {
        self.lock().describe_regions_failure = Some(error);
        self
    }

    /// Error returned for a dry-run DescribeRegions
    pub fn set_dry_run_error(&self, error: ApiError) -> &Self {
        self.lock().dry_run_error = error;
        self
    }

    /// Fail the instance scan of `region` when page `page` is requested
    pub fn fail_scan(&self, region: &str, page: usize, error: ApiError) -> &Self {
        self.with_region(region, |r| r.scan_failure = Some((page, error)));
        self
    }

    pub fn fail_defaults_read(&self, region: &str, error: ApiError) -> &Self {
        self.with_region(region, |r| r.defaults_read_failure = Some(error));
        self
    }

    pub fn fail_defaults_write(&self, region: &str, error: ApiError) -> &Self {
        self.with_region(region, |r| r.defaults_write_failure = Some(error));
        self
    }

    /// Make ModifyInstanceMetadataDefaults answer `Return=false`
    pub fn unacknowledge_defaults(&self, region: &str) -> &Self {
        self.with_region(region, |r| r.defaults_ack = false);
        self
    }

    /// Queue errors for the next modify calls on `instance_id`
    pub fn fail_instance(&self, region: &str, instance_id: &str, errors: Vec<ApiError>) -> &Self {
        self.with_region(region, |r| {
            r.instance_failures
                .entry(instance_id.to_string())
                .or_default()
                .extend(errors);
        });
        self
    }

    /// State reported by successful instance modifications in `region`
    pub fn set_apply_state(&self, region: &str, state: ApplyState) -> &Self {
        self.with_region(region, |r| r.apply_state = state);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls of one region, in order
    pub fn calls_in(&self, region: &str) -> Vec<CallKind> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.region == region)
            .map(|c| c.kind.clone())
            .collect()
    }

    /// Timestamps of instance modifications in `region`
    pub fn modify_times(&self, region: &str) -> Vec<Instant> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.region == region && matches!(c.kind, CallKind::ModifyInstance { .. }))
            .map(|c| c.at)
            .collect()
    }

    pub fn count_calls(&self, pred: impl Fn(&CallKind) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(&c.kind)).count()
    }

    /// Highest number of concurrent instance modifications seen in `region`
    pub fn max_in_flight(&self, region: &str) -> usize {
        self.with_region(region, |r| r.max_in_flight_modifies)
    }

    /// Highest number of regions with an instance modification in flight
    pub fn max_regions_mutating(&self) -> usize {
        self.lock().max_regions_mutating
    }

    /// Highest number of concurrent `call`s seen across all regions
    pub fn peak_in_flight(&self, call: ApiCall) -> usize {
        self.lock().peak_in_flight.get(&call).copied().unwrap_or(0)
    }

    fn begin(&self, call: ApiCall) {
        let mut state = self.lock();
        let current = state.in_flight.entry(call).or_insert(0);
        *current += 1;
        let current = *current;
        let peak = state.peak_in_flight.entry(call).or_insert(0);
        *peak = (*peak).max(current);
    }

    fn end(&self, call: ApiCall) {
        if let Some(current) = self.lock().in_flight.get_mut(&call) {
            *current -= 1;
        }
    }

    pub fn instance_tokens(&self, region: &str, instance_id: &str) -> Option<TokenMode> {
        self.with_region(region, |r| {
            r.instances
                .iter()
                .find(|i| i.instance_id.as_deref() == Some(instance_id))
                .and_then(|i| i.http_tokens.clone())
        })
    }

    pub fn default_tokens(&self, region: &str) -> Option<TokenMode> {
        self.with_region(region, |r| r.default_tokens.clone())
    }

    fn record(&self, region: &str, kind: CallKind) -> Duration {
        let mut state = self.lock();
        state.calls.push(Call {
            region: region.to_string(),
            kind,
            at: Instant::now(),
        });
        state.latency
    }
}

impl RegionClients for FakeAccount {
    type Client = FakeEc2;

    fn client_for(&self, region: &str) -> FakeEc2 {
        FakeEc2 {
            region: region.to_string(),
            account: self.clone(),
        }
    }
}

/// Per-region client over a [`FakeAccount`]
#[derive(Debug, Clone)]
pub struct FakeEc2 {
    region: String,
    account: FakeAccount,
}

async fn pause(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

fn page_index(next_token: Option<&str>) -> Result<usize, ApiError> {
    match next_token {
        None => Ok(0),
        Some(token) => token
            .strip_prefix("page-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| ApiError::new("InvalidParameterValue", "Invalid NextToken")),
    }
}

impl FakeEc2 {
    fn begin_modify(&self) {
        let mut state = self.account.lock();
        let region = state
            .regions
            .entry(self.region.clone())
            .or_insert_with(RegionState::new);
        region.in_flight_modifies += 1;
        region.max_in_flight_modifies =
            region.max_in_flight_modifies.max(region.in_flight_modifies);
        let starting_region = region.in_flight_modifies == 1;
        if starting_region {
            state.regions_mutating += 1;
            state.max_regions_mutating = state.max_regions_mutating.max(state.regions_mutating);
        }
    }

    fn end_modify(&self) {
        let mut state = self.account.lock();
        let region = state
            .regions
            .entry(self.region.clone())
            .or_insert_with(RegionState::new);
        region.in_flight_modifies -= 1;
        if region.in_flight_modifies == 0 {
            state.regions_mutating -= 1;
        }
    }

    fn apply_instance(&self, instance_id: &str) -> Result<ApplyState, ApiError> {
        self.account.with_region(&self.region, |r| {
            if let Some(err) = r
                .instance_failures
                .get_mut(instance_id)
                .and_then(VecDeque::pop_front)
            {
                return Err(err);
            }
            let instance = r
                .instances
                .iter_mut()
                .find(|i| i.instance_id.as_deref() == Some(instance_id))
                .ok_or_else(|| {
                    ApiError::new(
                        "InvalidInstanceID.NotFound",
                        format!("The instance ID '{instance_id}' does not exist"),
                    )
                })?;
            instance.http_tokens = Some(TokenMode::Required);
            Ok(r.apply_state)
        })
    }
}

impl Ec2Api for FakeEc2 {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_regions(&self, dry_run: bool) -> Result<Vec<Region>, ApiError> {
        let latency = self
            .account
            .record(&self.region, CallKind::DescribeRegions { dry_run });
        pause(latency).await;

        let state = self.account.lock();
        if dry_run {
            return Err(state.dry_run_error.clone());
        }
        if let Some(err) = &state.describe_regions_failure {
            return Err(err.clone());
        }
        Ok(state
            .listed_regions
            .iter()
            .map(|(name, status)| {
                Region::builder()
                    .region_name(name)
                    .set_opt_in_status(status.clone())
                    .endpoint(format!("ec2.{name}.amazonaws.com"))
                    .build()
            })
            .collect())
    }

    async fn describe_instances_page(
        &self,
        next_token: Option<String>,
    ) -> Result<InstancePage, ApiError> {
        let latency = self.account.record(
            &self.region,
            CallKind::DescribeInstances {
                next_token: next_token.clone(),
            },
        );
        self.account.begin(ApiCall::DescribeInstances);
        pause(latency).await;
        self.account.end(ApiCall::DescribeInstances);

        let page = page_index(next_token.as_deref())?;
        let page_size = self.account.lock().page_size;
        self.account.with_region(&self.region, |r| {
            if let Some((failing_page, err)) = &r.scan_failure {
                if *failing_page == page {
                    return Err(err.clone());
                }
            }
            let start = page * page_size;
            let instances: Vec<Instance> = r
                .instances
                .iter()
                .skip(start)
                .take(page_size)
                .map(FakeInstance::to_sdk)
                .collect();
            let next_token = (start + page_size < r.instances.len())
                .then(|| format!("page-{}", page + 1));
            Ok(InstancePage {
                instances,
                next_token,
            })
        })
    }

    async fn get_metadata_defaults(&self) -> Result<Option<TokenMode>, ApiError> {
        let latency = self.account.record(&self.region, CallKind::GetDefaults);
        self.account.begin(ApiCall::GetDefaults);
        pause(latency).await;
        self.account.end(ApiCall::GetDefaults);

        self.account.with_region(&self.region, |r| match &r.defaults_read_failure {
            Some(err) => Err(err.clone()),
            None => Ok(r.default_tokens.clone()),
        })
    }

    async fn require_instance_tokens(&self, instance_id: &str) -> Result<ApplyState, ApiError> {
        let latency = self.account.record(
            &self.region,
            CallKind::ModifyInstance {
                instance_id: instance_id.to_string(),
            },
        );
        self.begin_modify();
        pause(latency).await;
        let result = self.apply_instance(instance_id);
        self.end_modify();
        result
    }

    async fn require_default_tokens(&self) -> Result<bool, ApiError> {
        let latency = self.account.record(&self.region, CallKind::ModifyDefaults);
        self.account.begin(ApiCall::ModifyDefaults);
        pause(latency).await;
        self.account.end(ApiCall::ModifyDefaults);

        self.account.with_region(&self.region, |r| {
            if let Some(err) = &r.defaults_write_failure {
                return Err(err.clone());
            }
            if r.defaults_ack {
                r.default_tokens = Some(TokenMode::Required);
            }
            Ok(r.defaults_ack)
        })
    }
}
