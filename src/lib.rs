// Public modules
pub mod alerting;
pub mod config;
pub mod error;
pub mod inspection;
pub mod inspector;
pub mod kubernetes;
pub mod logs;
pub mod merge;
pub mod notify;
pub mod parsing;
pub mod producers;
pub mod rating;
pub mod report;
pub mod template;
pub mod types;

// Re-export commonly used items
pub use types::*;
pub use alerting::{fetch_signals, AlertResolver, ResolvedSignals};
pub use config::{load_config, load_config_with_env, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use error::InspectionError;
pub use inspection::{group_inspections, Inspectable, InspectionGrouper};
pub use inspector::{InspectionOutcome, Inspector, InspectorSettings};
pub use merge::merge_items;
pub use notify::{send_notification, Notification};
pub use rating::{rate, Rating, RatingSummary};
pub use report::{FileReportSink, ReportSink};
pub use template::{load_template, Template};
