use super::*;

#[test]
fn test_error_display() {
    let err = AnalyticsError::UserNotFound {
        id: "user-42".to_string(),
    };
    assert_eq!(err.to_string(), "用户未找到: user-42");

    let err = AnalyticsError::QueueFull {
        queue: "analytics".to_string(),
    };
    assert_eq!(err.to_string(), "队列已满: analytics");
}

#[test]
fn test_is_transient() {
    assert!(AnalyticsError::Cache("connection refused".to_string()).is_transient());
    assert!(AnalyticsError::Timeout("cache get".to_string()).is_transient());
    assert!(!AnalyticsError::DataStore("find failed".to_string()).is_transient());
    assert!(!AnalyticsError::Internal("oops".to_string()).is_transient());
}

#[test]
fn test_category() {
    assert_eq!(
        AnalyticsError::CacheUnavailable("x".to_string()).category(),
        "cache"
    );
    assert_eq!(
        AnalyticsError::UnknownTaskType {
            task_type: "bogus".to_string()
        }
        .category(),
        "worker"
    );
    assert_eq!(
        AnalyticsError::Configuration("bad ttl".to_string()).category(),
        "configuration"
    );
}

#[test]
fn test_from_serde_json() {
    let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: AnalyticsError = parse_err.into();
    assert!(matches!(err, AnalyticsError::Serialization(_)));
}
