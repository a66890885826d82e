//! # Result Cache
//!
//! Memoizes engine output keyed by a canonical request fingerprint.
//!
//! ## Behavior
//!
//! - **LRU**: `get` promotes an entry; `set` evicts the least recently used
//!   entry when the cache is full
//! - **TTL**: every entry expires after its time-to-live (default one hour);
//!   an expired entry is a miss even if it has not been swept yet
//! - **Integrity**: each entry carries a SHA-256 checksum of its serialized
//!   payload; a mismatch is treated as a miss and the entry is dropped
//! - **Context**: `bind_context` folds a digest of the coefficient table and
//!   engine policy into every key; rebinding to a different digest drops the
//!   entries computed under the old constants
//!
//! All mutations go through one mutex, so eviction order is linearized.
//! Construct a cache explicitly and share it with `Arc` where needed.
//!
//! ## Example
//!
//! ```rust
//! use wind_core::cache::ResultCache;
//! use wind_core::geometry::BuildingGeometry;
//! use wind_core::parameters::{CalculationRequest, ExposureCategory, WindParameters};
//! use wind_core::policy::{CacheConfig, EnginePolicy};
//! use wind_core::pressure::{calculate, illustrative_roof_table};
//!
//! let cache = ResultCache::new(CacheConfig::default());
//! let request = CalculationRequest::new(
//!     BuildingGeometry::rectangle(100.0, 80.0, 30.0),
//!     WindParameters::new(120.0, ExposureCategory::C),
//! );
//!
//! let result = cache
//!     .get_or_compute(&request, || {
//!         calculate(&request, &illustrative_roof_table(), &EnginePolicy::default())
//!     })
//!     .unwrap();
//! assert_eq!(cache.get(&request), Some(result));
//! assert_eq!(cache.metrics().hits, 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};
use sha2::{Digest, Sha256};

use crate::errors::{CalcError, CalcResult};
use crate::geometry::BuildingGeometry;
use crate::parameters::CalculationRequest;
use crate::policy::{CacheConfig, EnginePolicy};
use crate::pressure::coefficients::CoefficientTable;
use crate::pressure::CalculationResult;

// ============================================================================
// Clock
// ============================================================================

/// Time source for entry timestamps and expiry.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used for deterministic TTL tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Fingerprinting
// ============================================================================

/// Canonical parameter object for a request.
///
/// Keys are camelCase; L-shapes add their leg dimensions so distinct plans
/// never share a key.
pub fn fingerprint_fields(request: &CalculationRequest) -> Value {
    let (length, width) = request.geometry.bounding_dimensions();
    let (city, state) = match &request.location {
        Some(location) => (normalize_text(&location.city), normalize_text(&location.state)),
        None => (String::new(), String::new()),
    };
    let wind = &request.wind;

    let mut fields = json!({
        "height": request.geometry.height(),
        "length": length,
        "width": width,
        "exposureCategory": wind.exposure_category.code(),
        "city": city,
        "state": state,
        "riskCategory": wind.risk_category.code(),
        "windSpeed": wind.basic_wind_speed_mph,
        "professionalMode": request.professional_mode,
        "topographicFactor": wind.topographic_factor,
        "directionalityFactor": wind.directionality_factor,
        "asceEdition": wind.asce_edition.display_name(),
        "buildingClassification": wind.building_classification.display_name(),
        "includeInternalPressure": wind.include_internal_pressure,
        "considerGlazingFailure": wind.consider_glazing_failure,
        "effectiveWindArea": request.effective_wind_area_sqft,
    });

    if let BuildingGeometry::LShape {
        length1,
        width1,
        length2,
        width2,
        ..
    } = request.geometry
    {
        if let Value::Object(map) = &mut fields {
            map.insert("shape".into(), json!("l_shape"));
            map.insert("length1".into(), json!(length1));
            map.insert("width1".into(), json!(width1));
            map.insert("length2".into(), json!(length2));
            map.insert("width2".into(), json!(width2));
        }
    }
    fields
}

/// 64-char hex SHA-256 fingerprint of a request.
pub fn fingerprint(request: &CalculationRequest) -> String {
    fingerprint_json(&fingerprint_fields(request))
}

/// Request fingerprint scoped to a calculation context digest.
pub fn fingerprint_in_context(request: &CalculationRequest, context: &str) -> String {
    let mut fields = fingerprint_fields(request);
    if let Value::Object(map) = &mut fields {
        map.insert("calculationContext".into(), json!(context));
    }
    fingerprint_json(&fields)
}

/// Digest of everything besides the request that changes a result.
///
/// Cache and workflow settings are left out; they never affect pressures.
pub fn context_digest(table: &CoefficientTable, policy: &EnginePolicy) -> CalcResult<String> {
    let context = json!({
        "table": serde_json::to_value(table)?,
        "zoneSizing": serde_json::to_value(&policy.zone_sizing)?,
        "reentrantCorner": serde_json::to_value(&policy.reentrant_corner)?,
        "zone1Prime": serde_json::to_value(&policy.zone1_prime)?,
        "velocity": serde_json::to_value(&policy.velocity)?,
    });
    Ok(fingerprint_json(&context))
}

/// Fingerprint an arbitrary JSON parameter object.
///
/// Object keys are sorted recursively and numbers are normalized to floats,
/// so `{"a": 100, "b": 1}` and `{"b": 1.0, "a": 100.0}` hash identically.
pub fn fingerprint_json(value: &Value) -> String {
    sha256_hex(canonicalize(value).to_string().as_bytes())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> = map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Number(n) => n
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{:02x}", b)).collect()
}

fn checksum<T: Serialize>(value: &T) -> CalcResult<String> {
    Ok(sha256_hex(&serde_json::to_vec(value)?))
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    checksum: String,
    created_at: DateTime<Utc>,
    ttl: Duration,
    hits: u64,
    last_access: u64,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.created_at + self.ttl
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    /// hits / total_requests * 100
    pub hit_rate: f64,
    /// Running average of recorded calculation times (ms)
    pub average_calculation_ms: f64,
    pub entries: usize,
    pub capacity: usize,
    pub evictions: u64,
    pub expirations: u64,
    pub integrity_failures: u64,
}

#[derive(Debug)]
struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    context: Option<String>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    integrity_failures: u64,
    timed_calculations: u64,
    average_calculation_ms: f64,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        CacheState {
            entries: HashMap::new(),
            context: None,
            tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
            integrity_failures: 0,
            timed_calculations: 0,
            average_calculation_ms: 0.0,
        }
    }
}

impl<T> CacheState<T> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - self.entries.len();
        self.expirations += purged as u64;
        purged
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions += 1;
            tracing::debug!(key = %key, "evicted least recently used cache entry");
        }
    }
}

/// Thread-safe LRU + TTL cache of calculation results.
#[derive(Debug)]
pub struct ResultCache<T = CalculationResult> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<T>>,
}

impl<T> ResultCache<T>
where
    T: Clone + Serialize,
{
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        ResultCache {
            config,
            clock,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Key for a request under the bound context, if any.
    pub fn key_for(&self, request: &CalculationRequest) -> String {
        match self.lock().context.clone() {
            Some(context) => fingerprint_in_context(request, &context),
            None => fingerprint(request),
        }
    }

    /// Bind the cache to one coefficient table and policy.
    ///
    /// Returns true when the context changed; entries stored under a
    /// previous context are dropped.
    pub fn bind_context(&self, table: &CoefficientTable, policy: &EnginePolicy) -> CalcResult<bool> {
        let digest = context_digest(table, policy)?;
        let mut state = self.lock();
        if state.context.as_deref() == Some(digest.as_str()) {
            return Ok(false);
        }
        if state.context.is_some() {
            let dropped = state.entries.len();
            state.entries.clear();
            tracing::info!(dropped, "calculation context changed; cache entries dropped");
        }
        state.context = Some(digest);
        Ok(true)
    }

    pub fn context(&self) -> Option<String> {
        self.lock().context.clone()
    }

    /// Cached value if present, unexpired and intact. Promotes the entry.
    pub fn get(&self, request: &CalculationRequest) -> Option<T> {
        self.get_by_key(&self.key_for(request))
    }

    pub fn get_by_key(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut state = self.lock();
        let tick = state.next_tick();

        let outcome = match state.entries.get_mut(key) {
            None => Lookup::Missing,
            Some(entry) if entry.is_expired(now) => Lookup::Expired,
            Some(entry) => match checksum(&entry.value) {
                Ok(sum) if sum == entry.checksum => {
                    entry.hits += 1;
                    entry.last_access = tick;
                    Lookup::Hit(entry.value.clone())
                }
                Ok(_) => Lookup::Corrupt("checksum mismatch".to_string()),
                Err(e) => Lookup::Corrupt(e.to_string()),
            },
        };

        match outcome {
            Lookup::Hit(value) => {
                state.hits += 1;
                Some(value)
            }
            Lookup::Missing => {
                state.misses += 1;
                None
            }
            Lookup::Expired => {
                state.entries.remove(key);
                state.expirations += 1;
                state.misses += 1;
                None
            }
            Lookup::Corrupt(reason) => {
                state.entries.remove(key);
                state.integrity_failures += 1;
                state.misses += 1;
                let error = CalcError::cache_integrity(key, reason);
                tracing::warn!(error = %error, "dropping corrupt cache entry");
                None
            }
        }
    }

    /// Insert or overwrite with the default TTL, or `ttl` when given.
    pub fn set(&self, request: &CalculationRequest, value: T, ttl: Option<Duration>) -> CalcResult<()> {
        self.set_by_key(self.key_for(request), value, ttl)
    }

    pub fn set_by_key(&self, key: String, value: T, ttl: Option<Duration>) -> CalcResult<()> {
        let ttl = ttl.unwrap_or_else(|| Duration::seconds(self.config.default_ttl_secs));
        if ttl <= Duration::zero() {
            return Err(CalcError::invalid_input("ttl", ttl.to_string(), "TTL must be positive"));
        }
        let checksum = checksum(&value)?;
        let now = self.clock.now();

        let mut state = self.lock();
        state.purge_expired(now);
        if !state.entries.contains_key(&key) && state.entries.len() >= self.config.capacity {
            state.evict_lru();
        }
        let tick = state.next_tick();
        state.entries.insert(
            key,
            CacheEntry {
                value,
                checksum,
                created_at: now,
                ttl,
                hits: 0,
                last_access: tick,
            },
        );
        Ok(())
    }

    /// Present and unexpired. Does not count as a request or promote.
    pub fn has(&self, request: &CalculationRequest) -> bool {
        let now = self.clock.now();
        let key = self.key_for(request);
        self.lock()
            .entries
            .get(&key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit count of one entry
    pub fn entry_hits(&self, request: &CalculationRequest) -> Option<u64> {
        let key = self.key_for(request);
        self.lock().entries.get(&key).map(|entry| entry.hits)
    }

    /// Remove every entry and reset the metrics. The bound context is kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        let context = state.context.take();
        *state = CacheState::default();
        state.context = context;
    }

    /// Sweep expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.lock().purge_expired(now)
    }

    /// Insert precomputed results, returning how many were stored.
    pub fn preload(&self, items: Vec<(CalculationRequest, T)>) -> CalcResult<usize> {
        let count = items.len();
        for (request, value) in items {
            self.set(&request, value, None)?;
        }
        tracing::debug!(count, "preloaded cache entries");
        Ok(count)
    }

    /// Fold one calculation time into the running average.
    pub fn record_calculation_time(&self, elapsed_ms: f64) {
        let mut state = self.lock();
        state.timed_calculations += 1;
        let n = state.timed_calculations as f64;
        state.average_calculation_ms += (elapsed_ms - state.average_calculation_ms) / n;
    }

    /// Cached value, or compute, time and store it.
    ///
    /// The lock is not held while `compute` runs.
    pub fn get_or_compute<F>(&self, request: &CalculationRequest, compute: F) -> CalcResult<T>
    where
        F: FnOnce() -> CalcResult<T>,
    {
        let key = self.key_for(request);
        if let Some(value) = self.get_by_key(&key) {
            return Ok(value);
        }

        let started = Instant::now();
        let value = compute()?;
        self.record_calculation_time(started.elapsed().as_secs_f64() * 1000.0);
        self.set_by_key(key, value.clone(), None)?;
        Ok(value)
    }

    pub fn metrics(&self) -> CacheMetrics {
        let state = self.lock();
        let total_requests = state.hits + state.misses;
        let hit_rate = if total_requests == 0 {
            0.0
        } else {
            state.hits as f64 / total_requests as f64 * 100.0
        };
        CacheMetrics {
            total_requests,
            hits: state.hits,
            misses: state.misses,
            hit_rate,
            average_calculation_ms: state.average_calculation_ms,
            entries: state.entries.len(),
            capacity: self.config.capacity,
            evictions: state.evictions,
            expirations: state.expirations,
            integrity_failures: state.integrity_failures,
        }
    }

    #[cfg(test)]
    fn tamper(&self, request: &CalculationRequest) {
        let key = self.key_for(request);
        if let Some(entry) = self.lock().entries.get_mut(&key) {
            entry.checksum = "0".repeat(64);
        }
    }
}

enum Lookup<T> {
    Hit(T),
    Missing,
    Expired,
    Corrupt(String),
}
