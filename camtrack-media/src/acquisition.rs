//! Stream acquisition state machine
//!
//! The desired configuration is tried first. Permission denial ends the
//! acquisition at once; any other failure builds the fallback queue and
//! candidates are tried one at a time until a stream validates or the
//! queue runs dry. A stream counts as acquired only once its metadata has
//! loaded and a playable frame is available.

use crate::constraints::CaptureConfiguration;
use crate::element::{MediaStream, PlaybackAttributes, StreamMetadata, VideoElement};
use crate::error::{CaptureError, CaptureResult};
use crate::negotiation::build_fallbacks;
use crate::platform::PlatformProfile;
use async_trait::async_trait;
use camtrack_core::{FrameSource, PixelBuffer};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Capture device API
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Whether the capture API exists on this host
    fn is_supported(&self) -> bool {
        true
    }

    /// Open a stream satisfying `config`
    async fn get_user_media(
        &self,
        config: &CaptureConfiguration,
    ) -> CaptureResult<Arc<dyn MediaStream>>;
}

/// Acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Limit on stream validation per candidate; `None` waits forever
    pub validation_timeout_ms: Option<u64>,
    /// Interval at which stream elements poll for frames
    pub poll_interval_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            validation_timeout_ms: Some(10_000),
            poll_interval_ms: 5,
        }
    }
}

impl AcquisitionConfig {
    /// Validation limit as a duration
    pub fn validation_timeout(&self) -> Option<Duration> {
        self.validation_timeout_ms.map(Duration::from_millis)
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Acquisition state
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionState {
    /// Nothing attempted yet
    Idle,
    /// Waiting for the device to open a candidate
    Opening {
        /// 1-based attempt number
        attempt: u32,
        /// Candidate being opened
        candidate: CaptureConfiguration,
    },
    /// Waiting for the opened stream to become playable
    Validating {
        /// 1-based attempt number
        attempt: u32,
    },
    /// A stream validated
    Acquired {
        /// Attempt that succeeded
        attempt: u32,
    },
    /// Every candidate failed
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
    /// Acquisition ended without trying every candidate
    Failed {
        /// Why it ended
        reason: String,
    },
}

/// Acquisition events
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionEvent {
    /// A candidate is being opened
    AttemptStarted {
        /// 1-based attempt number
        attempt: u32,
        /// Candidate configuration
        config: CaptureConfiguration,
    },
    /// A candidate failed
    AttemptFailed {
        /// 1-based attempt number
        attempt: u32,
        /// Failure
        error: CaptureError,
    },
    /// Fallback queue built after the desired configuration failed
    FallbacksBuilt {
        /// Number of candidates
        count: usize,
    },
    /// A stream reached a playable state
    StreamValidated {
        /// Attempt that succeeded
        attempt: u32,
        /// Stream resolution
        metadata: StreamMetadata,
    },
    /// User declined access; no fallback attempted
    PermissionDenied {
        /// Attempt that was denied
        attempt: u32,
    },
    /// Every candidate failed
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
}

/// Acquisition metrics
#[derive(Debug, Clone, Default)]
pub struct AcquisitionMetrics {
    /// Attempts made
    pub attempts: u32,
    /// Failures by error kind
    pub failures: BTreeMap<String, u32>,
    /// Fallback candidates generated
    pub fallbacks_built: usize,
    /// Attempt that succeeded
    pub successful_attempt: Option<u32>,
    /// When the last attempt started
    pub last_attempt: Option<Instant>,
    /// Time from start to resolution
    pub elapsed: Option<Duration>,
}

impl AcquisitionMetrics {
    /// Total failed attempts
    pub fn total_failures(&self) -> u32 {
        self.failures.values().sum()
    }
}

/// Sequential stream acquirer
pub struct StreamAcquirer {
    device: Arc<dyn CaptureDevice>,
    profile: PlatformProfile,
    config: AcquisitionConfig,
    state: Arc<RwLock<AcquisitionState>>,
    metrics: Arc<RwLock<AcquisitionMetrics>>,
    event_tx: broadcast::Sender<AcquisitionEvent>,
}

impl std::fmt::Debug for StreamAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAcquirer")
            .field("profile", &self.profile)
            .field("config", &self.config)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl StreamAcquirer {
    /// Create an acquirer over a capture device
    pub fn new(device: Arc<dyn CaptureDevice>, profile: PlatformProfile) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            device,
            profile,
            config: AcquisitionConfig::default(),
            state: Arc::new(RwLock::new(AcquisitionState::Idle)),
            metrics: Arc::new(RwLock::new(AcquisitionMetrics::default())),
            event_tx,
        }
    }

    /// Override acquisition settings
    pub fn with_config(mut self, config: AcquisitionConfig) -> Self {
        self.config = config;
        self
    }

    /// Current state
    pub fn state(&self) -> AcquisitionState {
        self.state.read().clone()
    }

    /// Metrics of the last acquisition
    pub fn metrics(&self) -> AcquisitionMetrics {
        self.metrics.read().clone()
    }

    /// Subscribe to acquisition events
    pub fn subscribe_events(&self) -> broadcast::Receiver<AcquisitionEvent> {
        self.event_tx.subscribe()
    }

    /// Platform profile in use
    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    fn set_state(&self, state: AcquisitionState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: AcquisitionEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Acquire a validated stream bound to `element`
    ///
    /// Platform quirks are applied to `desired` once, before the first
    /// attempt; fallbacks derive from the adjusted configuration.
    pub async fn acquire(
        &mut self,
        desired: &CaptureConfiguration,
        mut element: Box<dyn VideoElement>,
    ) -> CaptureResult<VideoSource> {
        let started = Instant::now();
        *self.metrics.write() = AcquisitionMetrics::default();

        if !self.profile.media_devices_available || !self.device.is_supported() {
            let err = CaptureError::NotSupported {
                reason: "no media capture API on this platform".to_string(),
            };
            error!("{}", err);
            self.set_state(AcquisitionState::Failed {
                reason: err.to_string(),
            });
            return Err(err);
        }

        let desired = self.profile.apply_quirks(desired);
        info!("Acquiring video stream for {}", desired.label());

        let mut attempt = 1;
        let first = self.try_candidate(attempt, &desired, element.as_mut()).await;
        let first_error = match first {
            Ok((stream, metadata)) => {
                return Ok(self.finish(attempt, desired, element, stream, metadata, started))
            }
            Err(e) => e,
        };
        if first_error.is_permission_denied() {
            return Err(self.deny(attempt, first_error, started));
        }

        let mut queue = build_fallbacks(&desired);
        self.metrics.write().fallbacks_built = queue.len();
        self.emit(AcquisitionEvent::FallbacksBuilt { count: queue.len() });
        info!("{} fallback configurations available", queue.len());

        while let Some(candidate) = queue.pop_front() {
            attempt += 1;
            let result = self.try_candidate(attempt, &candidate, element.as_mut()).await;
            match result {
                Ok((stream, metadata)) => {
                    return Ok(self.finish(attempt, candidate, element, stream, metadata, started))
                }
                Err(e) if e.is_permission_denied() => {
                    return Err(self.deny(attempt, e, started));
                }
                Err(_) => continue,
            }
        }

        let err = CaptureError::AcquisitionExhausted { attempts: attempt };
        error!("{}", err);
        self.metrics.write().elapsed = Some(started.elapsed());
        self.set_state(AcquisitionState::Exhausted { attempts: attempt });
        self.emit(AcquisitionEvent::Exhausted { attempts: attempt });
        Err(err)
    }

    async fn try_candidate(
        &self,
        attempt: u32,
        candidate: &CaptureConfiguration,
        element: &mut dyn VideoElement,
    ) -> CaptureResult<(Arc<dyn MediaStream>, StreamMetadata)> {
        {
            let mut metrics = self.metrics.write();
            metrics.attempts += 1;
            metrics.last_attempt = Some(Instant::now());
        }
        self.set_state(AcquisitionState::Opening {
            attempt,
            candidate: candidate.clone(),
        });
        self.emit(AcquisitionEvent::AttemptStarted {
            attempt,
            config: candidate.clone(),
        });
        debug!("Capture attempt {} with {}", attempt, candidate.to_json());

        element.apply_playback(&PlaybackAttributes::for_config(candidate));

        let result = match self.device.get_user_media(candidate).await {
            Ok(stream) => {
                self.set_state(AcquisitionState::Validating { attempt });
                match self.validate(element, stream.clone()).await {
                    Ok(metadata) => Ok((stream, metadata)),
                    Err(e) => {
                        element.detach();
                        stream.stop();
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!("Capture attempt {} failed: {}", attempt, e);
            *self
                .metrics
                .write()
                .failures
                .entry(e.kind().to_string())
                .or_insert(0) += 1;
            self.emit(AcquisitionEvent::AttemptFailed {
                attempt,
                error: e.clone(),
            });
        }
        result
    }

    async fn validate(
        &self,
        element: &mut dyn VideoElement,
        stream: Arc<dyn MediaStream>,
    ) -> CaptureResult<StreamMetadata> {
        let stream_id = stream.id();
        element.attach(stream);
        let mut playback = element.playback();
        playback.muted = true;
        element.apply_playback(&playback);
        debug!("Stream {} attached, waiting for data", stream_id);

        let validation = async {
            let metadata = element.loaded_data().await?;
            info!(
                "Stream metadata loaded, resolution {}x{}",
                metadata.width, metadata.height
            );
            element.play()?;
            element.ready().await?;
            Ok::<_, CaptureError>(metadata)
        };

        match self.config.validation_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, validation)
                .await
                .map_err(|_| CaptureError::ValidationTimeout { timeout })?,
            None => validation.await,
        }
    }

    fn finish(
        &self,
        attempt: u32,
        config: CaptureConfiguration,
        element: Box<dyn VideoElement>,
        stream: Arc<dyn MediaStream>,
        metadata: StreamMetadata,
        started: Instant,
    ) -> VideoSource {
        {
            let mut metrics = self.metrics.write();
            metrics.successful_attempt = Some(attempt);
            metrics.elapsed = Some(started.elapsed());
        }
        self.set_state(AcquisitionState::Acquired { attempt });
        self.emit(AcquisitionEvent::StreamValidated { attempt, metadata });
        info!(
            "Video stream playing after {} attempt(s) with {}",
            attempt,
            config.label()
        );

        VideoSource {
            id: Uuid::new_v4(),
            element,
            stream,
            config,
            metadata,
            attempts: attempt,
        }
    }

    fn deny(&self, attempt: u32, err: CaptureError, started: Instant) -> CaptureError {
        error!("Camera access denied; not trying fallbacks");
        self.metrics.write().elapsed = Some(started.elapsed());
        self.set_state(AcquisitionState::Failed {
            reason: err.to_string(),
        });
        self.emit(AcquisitionEvent::PermissionDenied { attempt });
        err
    }
}

/// Bound, playing capture source
///
/// Owns the element and the hardware stream; the stream is stopped when the
/// source is dropped. Consumers get read-only frame access through
/// [`FrameSource`].
pub struct VideoSource {
    id: Uuid,
    element: Box<dyn VideoElement>,
    stream: Arc<dyn MediaStream>,
    config: CaptureConfiguration,
    metadata: StreamMetadata,
    attempts: u32,
}

impl std::fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSource")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("metadata", &self.metadata)
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl VideoSource {
    /// Configuration that succeeded
    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    /// Stream resolution
    pub fn metadata(&self) -> StreamMetadata {
        self.metadata
    }

    /// Attempts it took, including the successful one
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Underlying stream identifier
    pub fn stream_id(&self) -> Uuid {
        self.stream.id()
    }

    /// Element playback attributes
    pub fn playback(&self) -> PlaybackAttributes {
        self.element.playback()
    }

    /// Whether the hardware stream is still live
    pub fn is_active(&self) -> bool {
        self.stream.is_active()
    }
}

impl FrameSource for VideoSource {
    fn source_id(&self) -> Uuid {
        self.id
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.metadata.width, self.metadata.height)
    }

    fn current_frame(&self) -> Option<PixelBuffer> {
        self.element.current_frame()
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        debug!("Stopping video stream {}", self.stream.id());
        self.stream.stop();
    }
}
