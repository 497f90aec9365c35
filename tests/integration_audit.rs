//! 集成测试：审计日志
//!
//! 测试安全事件的创建、记录、过滤与统计。

use rolegate::audit::{
    AuditLogger, EventSeverity, EventType, InMemoryAuditLogger, NoOpAuditLogger, SecurityEvent,
};
use chrono::{Duration, Utc};

#[test]
fn test_security_event_builder() {
    let event = SecurityEvent::custom("policy_reloaded", EventSeverity::Info)
        .with_principal_id("ops")
        .with_handler("app.views.reload")
        .with_role("admin")
        .with_message("policy reloaded")
        .with_detail("source", "json")
        .with_severity(EventSeverity::Warning);

    assert_eq!(event.event_type, EventType::Custom("policy_reloaded".to_string()));
    assert_eq!(event.event_name(), "custom:policy_reloaded");
    assert_eq!(event.severity, EventSeverity::Warning);
    assert_eq!(event.principal_id.as_deref(), Some("ops"));
    assert_eq!(event.details.get("source"), Some(&"json".to_string()));
    assert!(!event.is_access_event());
}

#[test]
fn test_filter_by_principal_and_handler() {
    let logger = InMemoryAuditLogger::new();

    logger.log(SecurityEvent::permission_granted("alice", "app.views.a", "user"));
    logger.log(SecurityEvent::permission_granted("alice", "app.views.b", "user"));
    logger.log(SecurityEvent::permission_denied(Some("bob"), "app.views.a", "no rule"));

    assert_eq!(logger.get_events_by_principal("alice").len(), 2);
    assert_eq!(logger.get_events_by_principal("bob").len(), 1);
    assert_eq!(logger.get_events_by_handler("app.views.a").len(), 2);
    assert!(logger.get_events_by_principal("carol").is_empty());
}

#[test]
fn test_filter_by_time_range() {
    let logger = InMemoryAuditLogger::new();
    let start = Utc::now() - Duration::seconds(1);

    logger.log(SecurityEvent::handler_patched("app.views.a"));
    logger.log(SecurityEvent::insertion_point_installed("BaseView.get"));

    let end = Utc::now() + Duration::seconds(1);
    assert_eq!(logger.get_events_in_range(start, end).len(), 2);

    let past_end = start - Duration::seconds(10);
    assert!(logger.get_events_in_range(past_end, start).is_empty());
}

#[test]
fn test_recent_events_newest_first() {
    let logger = InMemoryAuditLogger::new();
    for handler in ["a", "b", "c"] {
        logger.log(SecurityEvent::handler_patched(handler));
    }

    let recent = logger.get_recent_events(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].handler.as_deref(), Some("c"));
    assert_eq!(recent[1].handler.as_deref(), Some("b"));
}

#[test]
fn test_stats_by_type_and_severity() {
    let logger = InMemoryAuditLogger::new();

    logger.log_batch(vec![
        SecurityEvent::permission_granted("a", "v", "user"),
        SecurityEvent::permission_granted("b", "v", "user"),
        SecurityEvent::permission_denied(None::<String>, "v", "no rule"),
        SecurityEvent::double_patch_detected("v"),
        SecurityEvent::config_warning("missing insertion point"),
    ]);

    let stats = logger.get_stats();
    assert_eq!(stats.total_events, 5);
    assert_eq!(stats.info_count, 2);
    assert_eq!(stats.warning_count, 2);
    assert_eq!(stats.error_count, 1);
    assert_eq!(stats.events_by_type.get("permission_granted"), Some(&2));
    assert_eq!(
        logger.get_events_by_severity(EventSeverity::Error)[0].event_type,
        EventType::DoublePatchDetected
    );
}

#[test]
fn test_logger_as_trait_object() {
    let loggers: Vec<Box<dyn AuditLogger>> = vec![
        Box::new(InMemoryAuditLogger::new()),
        Box::new(NoOpAuditLogger::new()),
    ];
    for logger in &loggers {
        logger.log(SecurityEvent::config_warning("selector unused"));
    }
}
