//! Event classifier (§4.3): a pure function from an engine message to a
//! closed, tagged `Action`. Replaces a string switch with exhaustive
//! dispatch over a sum type, per Design Note §9 "Sum-typed internal
//! actions".

use crate::engine::EngineMessage;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestartReason {
    Die,
    Restart,
    Oom,
}

impl RestartReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartReason::Die => "die",
            RestartReason::Restart => "restart",
            RestartReason::Oom => "oom",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Created {
        name: String,
        id: String,
    },
    Started {
        name: String,
        id: String,
    },
    Stopped {
        name: String,
        id: String,
        exit_code: Option<i64>,
    },
    RestartLike {
        name: String,
        id: String,
        reason: RestartReason,
        exit_code: Option<i64>,
        signal: Option<String>,
    },
    Signal {
        name: String,
        id: String,
        signal: Option<String>,
    },
    Health {
        name: String,
        id: String,
        status: String,
    },
    Rename {
        id: String,
        old_name: String,
        new_name: String,
    },
    Absent {
        name: String,
    },
    /// The message carried no name, and the name could not be resolved from
    /// its id either (§4.3: "message is dropped"). The dispatcher logs this
    /// and takes no further action.
    Unresolvable,
    /// Ignored: wrong message kind, or a suppressed healthcheck-exec event.
    Ignored,
}

/// Classify a single engine message. `resolved_name` is the name the
/// dispatcher looked up for this actor id when the message itself didn't
/// carry one (§4.3: "the classifier consults the store to resolve name from
/// id"); classification proper is synchronous and pure, so that lookup
/// happens one layer up and is threaded in here.
pub fn classify(msg: &EngineMessage, resolved_name: Option<&str>) -> Action {
    if msg.message_type != "container" {
        return Action::Ignored;
    }

    if is_healthcheck_exec(msg) {
        return Action::Ignored;
    }

    let name = msg
        .attr("name")
        .map(|s| s.to_string())
        .or_else(|| resolved_name.map(|s| s.to_string()));

    let id = msg.actor_id.clone();

    // rename and destroy/remove carry their own name semantics below.
    match msg.action.as_str() {
        "rename" => {
            let old_name = msg.attr("oldName").unwrap_or_default().to_string();
            let new_name = name.unwrap_or_default();
            if old_name.is_empty() || new_name.is_empty() {
                return Action::Unresolvable;
            }
            return Action::Rename {
                id,
                old_name,
                new_name,
            };
        }
        "destroy" | "remove" | "rm" => {
            return match name {
                Some(name) => Action::Absent { name },
                None => Action::Unresolvable,
            };
        }
        _ => {}
    }

    let Some(name) = name else {
        return Action::Unresolvable;
    };

    if msg.action == "create" {
        return Action::Created { name, id };
    }
    if msg.action == "start" {
        return Action::Started { name, id };
    }
    if msg.action == "stop" {
        return Action::Stopped {
            name,
            id,
            exit_code: parse_exit_code(msg),
        };
    }
    if msg.action == "die" {
        let exit_code = parse_exit_code(msg);
        return match exit_code {
            None | Some(0) => Action::Stopped {
                name,
                id,
                exit_code,
            },
            Some(_) => Action::RestartLike {
                name,
                id,
                reason: RestartReason::Die,
                exit_code,
                signal: None,
            },
        };
    }
    if msg.action == "restart" {
        return Action::RestartLike {
            name,
            id,
            reason: RestartReason::Restart,
            exit_code: None,
            signal: None,
        };
    }
    if msg.action == "oom" {
        return Action::RestartLike {
            name,
            id,
            reason: RestartReason::Oom,
            exit_code: None,
            signal: None,
        };
    }
    if msg.action == "kill" {
        return Action::Signal {
            name,
            id,
            signal: msg.attr("signal").map(|s| s.to_string()),
        };
    }
    if let Some(status) = msg.action.strip_prefix("health_status:") {
        return Action::Health {
            name,
            id,
            status: status.trim().to_string(),
        };
    }

    Action::Ignored
}

fn is_healthcheck_exec(msg: &EngineMessage) -> bool {
    if !msg.action.starts_with("exec_") {
        return false;
    }
    msg.attr("execCommand")
        .map(|cmd| cmd.contains("HEALTHCHECK") || cmd.contains("healthcheck"))
        .unwrap_or(false)
}

fn parse_exit_code(msg: &EngineMessage) -> Option<i64> {
    msg.attr("exitCode").and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn msg(action: &str, attrs: &[(&str, &str)]) -> EngineMessage {
        EngineMessage {
            message_type: "container".to_string(),
            action: action.to_string(),
            actor_id: "abc123".to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            time: None,
        }
    }

    #[test]
    fn non_container_messages_are_ignored() {
        let mut m = msg("create", &[("name", "web")]);
        m.message_type = "network".to_string();
        assert_eq!(classify(&m, None), Action::Ignored);
    }

    #[test]
    fn healthcheck_exec_is_suppressed() {
        let m = msg("exec_create", &[("execCommand", "CMD-SHELL healthcheck.sh")]);
        assert_eq!(classify(&m, None), Action::Ignored);
    }

    #[test]
    fn die_with_zero_exit_is_stopped() {
        let m = msg("die", &[("name", "web"), ("exitCode", "0")]);
        assert_eq!(
            classify(&m, None),
            Action::Stopped {
                name: "web".to_string(),
                id: "abc123".to_string(),
                exit_code: Some(0),
            }
        );
    }

    #[test]
    fn die_with_nonzero_exit_is_restart_like() {
        let m = msg("die", &[("name", "web"), ("exitCode", "137")]);
        assert_eq!(
            classify(&m, None),
            Action::RestartLike {
                name: "web".to_string(),
                id: "abc123".to_string(),
                reason: RestartReason::Die,
                exit_code: Some(137),
                signal: None,
            }
        );
    }

    #[test]
    fn kill_carries_signal() {
        let m = msg("kill", &[("name", "web"), ("signal", "SIGTERM")]);
        assert_eq!(
            classify(&m, None),
            Action::Signal {
                name: "web".to_string(),
                id: "abc123".to_string(),
                signal: Some("SIGTERM".to_string()),
            }
        );
    }

    #[test]
    fn health_status_carries_token() {
        let m = msg("health_status: unhealthy", &[("name", "web")]);
        assert_eq!(
            classify(&m, None),
            Action::Health {
                name: "web".to_string(),
                id: "abc123".to_string(),
                status: "unhealthy".to_string(),
            }
        );
    }

    #[test]
    fn missing_name_resolves_from_id_lookup() {
        let m = msg("start", &[]);
        assert_eq!(
            classify(&m, Some("web")),
            Action::Started {
                name: "web".to_string(),
                id: "abc123".to_string(),
            }
        );
    }

    #[test]
    fn missing_name_unresolvable_drops_the_message() {
        let m = msg("start", &[]);
        assert_eq!(classify(&m, None), Action::Unresolvable);
    }

    #[test]
    fn rename_carries_old_and_new_names() {
        let m = msg("rename", &[("name", "b"), ("oldName", "a")]);
        assert_eq!(
            classify(&m, None),
            Action::Rename {
                id: "abc123".to_string(),
                old_name: "a".to_string(),
                new_name: "b".to_string(),
            }
        );
    }

    #[test]
    fn destroy_marks_absent() {
        let m = msg("destroy", &[("name", "web")]);
        assert_eq!(
            classify(&m, None),
            Action::Absent {
                name: "web".to_string()
            }
        );
    }
}
