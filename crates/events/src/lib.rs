//! Domain events and the in-process event bus.
//!
//! - [`DomainEvent`] / [`EventType`]: the closed set of learning-activity facts
//! - [`EventEnvelope`]: immutable identity + timing wrapper handed to subscribers
//! - [`EventSubscriber`]: async consumer contract
//! - [`EventBus`] / [`InMemoryEventBus`]: failure-isolating fan-out

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod subscriber;

pub use bus::{EventBus, FailureKind, PublishReport, SubscriberFailure};
pub use envelope::{EventEnvelope, EventMetadata};
pub use event::{
    CURRENT_SCHEMA_VERSION, CertificateEarned, CourseCompleted, CourseEnrolled, DomainEvent,
    EventType, LessonCompleted, ProfileCompleted, QuestionnaireCompleted, StudySessionCompleted,
    UserLogin,
};
pub use in_memory_bus::InMemoryEventBus;
pub use subscriber::{EventSubscriber, HandlerError};
