//! Integration tests for error types

#[cfg(test)]
mod tests {
    use upd_errors::*;

    #[test]
    fn test_error_conversion() {
        let resource_err = ResourceError::Timeout {
            resource: "dpkg-lock".into(),
            timeout_ms: 120_000,
        };
        let err: Error = resource_err.into();
        assert!(matches!(err, Error::Resource(_)));
    }

    #[test]
    fn test_error_display() {
        let err = PluginError::ProcessFailed {
            plugin: "apt".into(),
            phase: "execute".into(),
            code: 100,
        };
        assert_eq!(err.to_string(), "plugin apt failed in execute: exit code 100");
    }

    #[test]
    fn test_error_clone() {
        let err = PluginError::NotFound {
            program: "upd-plugin-apt".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_scheduler_error_conversion() {
        let err: Error = SchedulerError::TaskFailed {
            message: "panicked".into(),
        }
        .into();
        assert!(matches!(err, Error::Scheduler(_)));
    }
}
