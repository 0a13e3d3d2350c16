use inquire::{Confirm, InquireError};
use skysnapper_core::{
    Config, Coordinate, LocationAuthorization, LocationEvent, LocationEventSink, LocationPlatform,
};

/// Location source for a terminal session.
///
/// Permission is asked with a yes/no prompt and the position is the fixed
/// location stored in the config file.
#[derive(Debug, Clone)]
pub struct TerminalPlatform {
    status: LocationAuthorization,
    fixed: Option<Coordinate>,
}

impl TerminalPlatform {
    pub fn from_config(config: &Config) -> Self {
        Self {
            status: config.location_permission.unwrap_or(LocationAuthorization::NotDetermined),
            fixed: config.location,
        }
    }
}

impl LocationPlatform for TerminalPlatform {
    fn authorization_status(&self) -> LocationAuthorization {
        self.status
    }

    fn request_authorization(&self, events: LocationEventSink) {
        // inquire blocks on stdin; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let answer = Confirm::new("Allow SkySnapper to use your location?")
                .with_default(true)
                .with_help_message("Your answer is remembered in the config file")
                .prompt();
            events.send(LocationEvent::AuthorizationChanged(authorization_from(answer)));
        });
    }

    fn start_updating_location(&self, events: LocationEventSink) {
        match self.fixed {
            Some(coordinate) => events.send(LocationEvent::LocationUpdated(coordinate)),
            None => events.send(LocationEvent::ServicesDisabled),
        }
    }

    fn stop_updating_location(&self) {}
}

fn authorization_from(answer: Result<bool, InquireError>) -> LocationAuthorization {
    match answer {
        Ok(true) => LocationAuthorization::Authorized,
        Ok(false) => LocationAuthorization::Denied,
        Err(err) => {
            tracing::warn!(error = %err, "Location permission prompt did not complete");
            LocationAuthorization::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_answers_map_to_authorization() {
        assert_eq!(authorization_from(Ok(true)), LocationAuthorization::Authorized);
        assert_eq!(authorization_from(Ok(false)), LocationAuthorization::Denied);
        assert_eq!(
            authorization_from(Err(InquireError::OperationCanceled)),
            LocationAuthorization::Unknown
        );
    }

    #[test]
    fn undecided_config_starts_not_determined() {
        let platform = TerminalPlatform::from_config(&Config::default());
        assert_eq!(platform.authorization_status(), LocationAuthorization::NotDetermined);
    }

    #[test]
    fn saved_decision_is_reused() {
        let cfg = Config {
            location_permission: Some(LocationAuthorization::Denied),
            ..Config::default()
        };
        let platform = TerminalPlatform::from_config(&cfg);
        assert_eq!(platform.authorization_status(), LocationAuthorization::Denied);
    }
}
