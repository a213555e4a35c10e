//! The `utils` module holds the pieces shared by every other module: the
//! error types and logging initialisation.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests {
    use super::error::{ClientError, Error, ProtocolError, WorkerError};
    use super::logging;
    use crate::client::ConnectionId;
    use serial_test::serial;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    #[serial]
    fn logging_init_accepts_levels() {
        temp_env::with_var_unset("RUST_LOG", || {
            // Should not panic
            logging::init("info");
            logging::init("debug");
            logging::init("subcast=loud");
        });
    }

    #[test]
    #[serial]
    fn log_filter_uses_configured_directives() {
        temp_env::with_var_unset("RUST_LOG", || {
            assert_eq!(
                logging::filter("warn").max_level_hint(),
                Some(LevelFilter::WARN)
            );
            assert_eq!(
                logging::filter("subcast=debug,info").max_level_hint(),
                Some(LevelFilter::DEBUG)
            );
            assert_eq!(
                logging::filter("subcast=loud").max_level_hint(),
                Some(LevelFilter::INFO)
            );
        });
    }

    #[test]
    #[serial]
    fn log_filter_prefers_rust_log() {
        temp_env::with_var("RUST_LOG", Some("subcast=trace"), || {
            let filter = logging::filter("error");
            assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
            assert!(filter.to_string().to_lowercase().contains("subcast=trace"));
        });

        temp_env::with_var("RUST_LOG", Some("subcast=loud"), || {
            assert_eq!(
                logging::filter("error").max_level_hint(),
                Some(LevelFilter::ERROR)
            );
        });
    }

    #[test]
    fn errors_render_context() {
        assert_eq!(
            ProtocolError::UnknownType(9).to_string(),
            "unknown message type 0x09"
        );
        assert_eq!(
            WorkerError::WorkerUnavailable(3).to_string(),
            "worker 3 is no longer running"
        );

        let id = ConnectionId::new();
        let err: Error = ClientError::Closed(id).into();
        assert_eq!(err.to_string(), format!("connection {id} is closed"));
    }
}
