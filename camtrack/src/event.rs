//! Event system for session events

use crate::session::DisplayState;
use camtrack_core::PipelineEvent;
use camtrack_media::AcquisitionEvent;
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

/// Events that can occur during a session
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Stream acquisition progress
    Acquisition(AcquisitionEvent),
    /// Tracking pipeline progress
    Pipeline(PipelineEvent),
    /// What the session displays changed
    DisplayStateChanged {
        /// New display state
        state: DisplayState,
    },
    /// The session stopped
    SessionClosed {
        /// Why it stopped
        reason: String,
    },
}

impl Event {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Acquisition(event) => match event {
                AcquisitionEvent::AttemptStarted { .. } => "attempt_started",
                AcquisitionEvent::AttemptFailed { .. } => "attempt_failed",
                AcquisitionEvent::FallbacksBuilt { .. } => "fallbacks_built",
                AcquisitionEvent::StreamValidated { .. } => "stream_validated",
                AcquisitionEvent::PermissionDenied { .. } => "permission_denied",
                AcquisitionEvent::Exhausted { .. } => "acquisition_exhausted",
            },
            Event::Pipeline(event) => match event {
                PipelineEvent::SurfaceAttached { .. } => "surface_attached",
                PipelineEvent::TargetTrained { .. } => "target_trained",
                PipelineEvent::OverlayAttached => "overlay_attached",
                PipelineEvent::FrameRendered { .. } => "frame_rendered",
                PipelineEvent::FieldOfViewChanged { .. } => "field_of_view_changed",
                PipelineEvent::OverlayHidden => "overlay_hidden",
                PipelineEvent::ViewportChanged { .. } => "viewport_changed",
            },
            Event::DisplayStateChanged { .. } => "display_state_changed",
            Event::SessionClosed { .. } => "session_closed",
        }
    }

    /// Check if this is an acquisition event
    pub fn is_acquisition_event(&self) -> bool {
        matches!(self, Event::Acquisition(_))
    }

    /// Check if this is a tracking pipeline event
    pub fn is_tracking_event(&self) -> bool {
        matches!(self, Event::Pipeline(_))
    }

    /// Check if this is a session state event
    pub fn is_state_event(&self) -> bool {
        matches!(
            self,
            Event::DisplayStateChanged { .. } | Event::SessionClosed { .. }
        )
    }

    /// Check if this is an error event
    pub fn is_error_event(&self) -> bool {
        matches!(
            self,
            Event::Acquisition(AcquisitionEvent::AttemptFailed { .. })
                | Event::Acquisition(AcquisitionEvent::PermissionDenied { .. })
                | Event::Acquisition(AcquisitionEvent::Exhausted { .. })
                | Event::DisplayStateChanged {
                    state: DisplayState::Failed { .. }
                }
        )
    }
}

/// Stream of session events
#[derive(Debug)]
pub struct EventStream {
    /// Receiver for events
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<Event>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(mpsc::error::TryRecvError::Disconnected)
            }
        }
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Only yield events matching `filter`
    pub fn filtered(self, filter: EventFilter) -> FilteredEventStream {
        FilteredEventStream::new(self, filter)
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.receiver.poll_recv(cx)
    }
}

/// Event filter for selective event processing
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Whether to include acquisition events
    pub include_acquisition_events: bool,
    /// Whether to include tracking pipeline events
    pub include_tracking_events: bool,
    /// Whether to include session state events
    pub include_state_events: bool,
    /// Whether to include error events
    pub include_error_events: bool,
    /// Specific event types to include (if specified, overrides other filters)
    pub specific_event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a filter that includes all events
    pub fn all() -> Self {
        Self {
            include_acquisition_events: true,
            include_tracking_events: true,
            include_state_events: true,
            include_error_events: true,
            specific_event_types: None,
        }
    }

    /// Create a filter that includes only acquisition events
    pub fn acquisition_only() -> Self {
        Self {
            include_acquisition_events: true,
            ..Self::none()
        }
    }

    /// Create a filter that includes only tracking pipeline events
    pub fn tracking_only() -> Self {
        Self {
            include_tracking_events: true,
            ..Self::none()
        }
    }

    /// Create a filter that includes only session state events
    pub fn state_only() -> Self {
        Self {
            include_state_events: true,
            ..Self::none()
        }
    }

    /// Create a filter that includes only error events
    pub fn errors_only() -> Self {
        Self {
            include_error_events: true,
            ..Self::none()
        }
    }

    /// Create a filter for specific event types
    pub fn specific(event_types: Vec<String>) -> Self {
        Self {
            specific_event_types: Some(event_types),
            ..Self::none()
        }
    }

    fn none() -> Self {
        Self {
            include_acquisition_events: false,
            include_tracking_events: false,
            include_state_events: false,
            include_error_events: false,
            specific_event_types: None,
        }
    }

    /// Check if an event should be included based on this filter
    pub fn should_include(&self, event: &Event) -> bool {
        if let Some(ref specific_types) = self.specific_event_types {
            return specific_types.iter().any(|t| t == event.event_type());
        }

        (self.include_acquisition_events && event.is_acquisition_event())
            || (self.include_tracking_events && event.is_tracking_event())
            || (self.include_state_events && event.is_state_event())
            || (self.include_error_events && event.is_error_event())
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Filtered event stream that only yields events matching a filter
#[derive(Debug)]
pub struct FilteredEventStream {
    stream: EventStream,
    filter: EventFilter,
}

impl FilteredEventStream {
    /// Create a new filtered event stream
    pub fn new(stream: EventStream, filter: EventFilter) -> Self {
        Self { stream, filter }
    }

    /// Get the next event that matches the filter
    pub async fn next(&mut self) -> Option<Event> {
        while let Some(event) = self.stream.next().await {
            if self.filter.should_include(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Try to get the next filtered event without blocking
    pub fn try_next(&mut self) -> Result<Option<Event>, mpsc::error::TryRecvError> {
        while let Some(event) = self.stream.try_next()? {
            if self.filter.should_include(&event) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Update the filter
    pub fn set_filter(&mut self, filter: EventFilter) {
        self.filter = filter;
    }

    /// Get the current filter
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for FilteredEventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        loop {
            match futures::ready!(Pin::new(&mut self.stream).poll_next(cx)) {
                Some(event) if self.filter.should_include(&event) => return Poll::Ready(Some(event)),
                Some(_) => continue,
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Fan-out of session events to every live [`EventStream`]
#[derive(Debug, Clone, Default)]
pub(crate) struct EventHub {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<Event>>>>,
}

impl EventHub {
    pub(crate) fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        EventStream::new(rx)
    }

    pub(crate) fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            debug!("No subscribers for {}", event.event_type());
        }
    }

    /// Drop every subscriber so their streams end
    pub(crate) fn close(&self) {
        self.subscribers.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn rendered() -> Event {
        Event::Pipeline(PipelineEvent::FrameRendered {
            target_id: 1,
            posed: true,
        })
    }

    fn denied() -> Event {
        Event::Acquisition(AcquisitionEvent::PermissionDenied { attempt: 1 })
    }

    #[test]
    fn test_event_filter() {
        let closed = Event::SessionClosed {
            reason: "shutdown".to_string(),
        };

        let all_filter = EventFilter::all();
        assert!(all_filter.should_include(&rendered()));
        assert!(all_filter.should_include(&denied()));
        assert!(all_filter.should_include(&closed));

        let tracking = EventFilter::tracking_only();
        assert!(tracking.should_include(&rendered()));
        assert!(!tracking.should_include(&denied()));
        assert!(!tracking.should_include(&closed));

        let errors = EventFilter::errors_only();
        assert!(errors.should_include(&denied()));
        assert!(errors.should_include(&Event::DisplayStateChanged {
            state: DisplayState::Failed {
                message: "x".to_string()
            }
        }));
        assert!(!errors.should_include(&Event::DisplayStateChanged {
            state: DisplayState::Tracking
        }));

        let specific = EventFilter::specific(vec!["session_closed".to_string()]);
        assert!(specific.should_include(&closed));
        assert!(!specific.should_include(&rendered()));
    }

    #[tokio::test]
    async fn test_filtered_event_stream() {
        let hub = EventHub::default();
        let mut filtered = hub.subscribe().filtered(EventFilter::acquisition_only());

        hub.publish(rendered());
        hub.publish(denied());

        assert_eq!(filtered.next().await, Some(denied()));

        hub.publish(rendered());
        assert_eq!(filtered.try_next().unwrap(), None);
    }

    #[tokio::test]
    async fn test_hub_fans_out_and_closes() {
        let hub = EventHub::default();
        let first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.publish(rendered());
        drop(first);
        hub.publish(denied());
        assert_eq!(hub.subscribers.lock().len(), 1);

        hub.close();
        let events: Vec<Event> = StreamExt::collect(&mut second).await;
        assert_eq!(events, vec![rendered(), denied()]);
    }
}
