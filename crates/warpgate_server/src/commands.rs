use warpgate_shared::portal::PortalColor;

use crate::listeners::InteractAction;
use crate::plugin::ClearTarget;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Noop,
    Stop,
    List,
    Help,
    Join {
        name: String,
        world: Option<String>,
    },
    Leave(String),
    Teleport {
        player: String,
        x: f64,
        y: f64,
        z: f64,
    },
    Look {
        player: String,
        yaw: f32,
        pitch: f32,
    },
    Use {
        player: String,
        action: InteractAction,
    },
    PlacePortal {
        color: PortalColor,
        player: Option<String>,
    },
    PortalStatus(Option<String>),
    PortalGun(Option<String>),
    PortalClear {
        player: Option<String>,
        target: ClearTarget,
    },
    Portals,
    Loops(LoopAction),
    InvalidUsage(String),
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Noop;
    }

    let input = trimmed.strip_prefix('/').unwrap_or(trimmed);
    if input.is_empty() {
        return Command::Noop;
    }

    let mut head_tail = input.splitn(2, char::is_whitespace);
    let command = head_tail.next().unwrap_or_default().to_ascii_lowercase();
    let rest = head_tail.next().unwrap_or("").trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    match command.as_str() {
        "stop" => Command::Stop,
        "list" => Command::List,
        "help" => Command::Help,
        "p1" | "p2" => {
            let color = if command == "p1" {
                PortalColor::Blue
            } else {
                PortalColor::Orange
            };
            match args.as_slice() {
                [] => Command::PlacePortal {
                    color,
                    player: None,
                },
                [player] => Command::PlacePortal {
                    color,
                    player: Some(player.to_string()),
                },
                _ => Command::InvalidUsage(format!("Usage: /{command} [player]")),
            }
        }
        "portalstatus" | "pstatus" => match args.as_slice() {
            [] => Command::PortalStatus(None),
            [player] => Command::PortalStatus(Some(player.to_string())),
            _ => Command::InvalidUsage("Usage: /portalstatus [player]".to_string()),
        },
        "portalgun" => match args.as_slice() {
            [] => Command::PortalGun(None),
            [player] => Command::PortalGun(Some(player.to_string())),
            _ => Command::InvalidUsage("Usage: /portalgun [player]".to_string()),
        },
        "portalclear" => parse_portal_clear(&args),
        "portals" => Command::Portals,
        "loops" => match args.as_slice() {
            [action] if action.eq_ignore_ascii_case("start") => Command::Loops(LoopAction::Start),
            [action] if action.eq_ignore_ascii_case("stop") => Command::Loops(LoopAction::Stop),
            _ => Command::InvalidUsage("Usage: /loops <start|stop>".to_string()),
        },
        "join" => match args.as_slice() {
            [name] => Command::Join {
                name: name.to_string(),
                world: None,
            },
            [name, world] => Command::Join {
                name: name.to_string(),
                world: Some(world.to_string()),
            },
            _ => Command::InvalidUsage("Usage: /join <name> [world]".to_string()),
        },
        "leave" => match args.as_slice() {
            [player] => Command::Leave(player.to_string()),
            _ => Command::InvalidUsage("Usage: /leave <player|id>".to_string()),
        },
        "tp" => match args.as_slice() {
            [player, x, y, z] => {
                match (x.parse::<f64>(), y.parse::<f64>(), z.parse::<f64>()) {
                    (Ok(x), Ok(y), Ok(z)) if x.is_finite() && y.is_finite() && z.is_finite() => {
                        Command::Teleport {
                            player: player.to_string(),
                            x,
                            y,
                            z,
                        }
                    }
                    _ => Command::InvalidUsage("Usage: /tp <player|id> <x> <y> <z>".to_string()),
                }
            }
            _ => Command::InvalidUsage("Usage: /tp <player|id> <x> <y> <z>".to_string()),
        },
        "look" => {
            let usage = || Command::InvalidUsage("Usage: /look <player|id> <yaw> [pitch]".to_string());
            match args.as_slice() {
                [player, yaw] => match yaw.parse::<f32>() {
                    Ok(yaw) if yaw.is_finite() => Command::Look {
                        player: player.to_string(),
                        yaw,
                        pitch: 0.0,
                    },
                    _ => usage(),
                },
                [player, yaw, pitch] => match (yaw.parse::<f32>(), pitch.parse::<f32>()) {
                    (Ok(yaw), Ok(pitch))
                        if yaw.is_finite() && (-90.0..=90.0).contains(&pitch) =>
                    {
                        Command::Look {
                            player: player.to_string(),
                            yaw,
                            pitch,
                        }
                    }
                    _ => usage(),
                },
                _ => usage(),
            }
        }
        "use" => {
            let action = match args.get(1).map(|hand| hand.to_ascii_lowercase()).as_deref() {
                Some("left") => Some(InteractAction::Primary),
                Some("right") => Some(InteractAction::Secondary),
                Some("use") => Some(InteractAction::Use),
                _ => None,
            };
            match (args.as_slice(), action) {
                ([player, _], Some(action)) => Command::Use {
                    player: player.to_string(),
                    action,
                },
                _ => Command::InvalidUsage("Usage: /use <player|id> <left|right|use>".to_string()),
            }
        }
        _ => Command::Unknown(input.to_string()),
    }
}

fn parse_portal_clear(args: &[&str]) -> Command {
    let usage = || Command::InvalidUsage("Usage: /portalclear [player] [blue|orange|all]".to_string());
    match args {
        [] => Command::PortalClear {
            player: None,
            target: ClearTarget::All,
        },
        [single] => match ClearTarget::parse(single) {
            Some(target) => Command::PortalClear {
                player: None,
                target,
            },
            None => Command::PortalClear {
                player: Some(single.to_string()),
                target: ClearTarget::All,
            },
        },
        [player, target] => match ClearTarget::parse(target) {
            Some(target) => Command::PortalClear {
                player: Some(player.to_string()),
                target,
            },
            None => usage(),
        },
        _ => usage(),
    }
}

#[cfg(test)]
mod tests {
    use warpgate_shared::portal::PortalColor;

    use super::{parse_command, Command, LoopAction};
    use crate::listeners::InteractAction;
    use crate::plugin::ClearTarget;

    #[test]
    fn parses_portal_commands() {
        assert_eq!(
            parse_command("/p1"),
            Command::PlacePortal {
                color: PortalColor::Blue,
                player: None
            }
        );
        assert_eq!(
            parse_command("p2 Alice"),
            Command::PlacePortal {
                color: PortalColor::Orange,
                player: Some("Alice".to_string())
            }
        );
        assert_eq!(parse_command("/pstatus"), Command::PortalStatus(None));
        assert_eq!(
            parse_command("/PortalStatus Bob"),
            Command::PortalStatus(Some("Bob".to_string()))
        );
        assert_eq!(parse_command("/portalgun"), Command::PortalGun(None));
        assert_eq!(parse_command("/portals"), Command::Portals);
        assert_eq!(
            parse_command("/loops stop"),
            Command::Loops(LoopAction::Stop)
        );
    }

    #[test]
    fn portal_clear_accepts_player_and_color_in_any_subset() {
        assert_eq!(
            parse_command("/portalclear"),
            Command::PortalClear {
                player: None,
                target: ClearTarget::All
            }
        );
        assert_eq!(
            parse_command("/portalclear orange"),
            Command::PortalClear {
                player: None,
                target: ClearTarget::Only(PortalColor::Orange)
            }
        );
        assert_eq!(
            parse_command("/portalclear Alice"),
            Command::PortalClear {
                player: Some("Alice".to_string()),
                target: ClearTarget::All
            }
        );
        assert_eq!(
            parse_command("/portalclear Alice blue"),
            Command::PortalClear {
                player: Some("Alice".to_string()),
                target: ClearTarget::Only(PortalColor::Blue)
            }
        );
        assert_eq!(
            parse_command("/portalclear Alice purple"),
            Command::InvalidUsage("Usage: /portalclear [player] [blue|orange|all]".to_string())
        );
    }

    #[test]
    fn parses_host_commands() {
        assert_eq!(parse_command("/stop"), Command::Stop);
        assert_eq!(parse_command("  "), Command::Noop);
        assert_eq!(
            parse_command("/join Alice nether"),
            Command::Join {
                name: "Alice".to_string(),
                world: Some("nether".to_string())
            }
        );
        assert_eq!(
            parse_command("/tp Alice 11 65.5 -11"),
            Command::Teleport {
                player: "Alice".to_string(),
                x: 11.0,
                y: 65.5,
                z: -11.0
            }
        );
        assert_eq!(
            parse_command("/look Alice 90 -30"),
            Command::Look {
                player: "Alice".to_string(),
                yaw: 90.0,
                pitch: -30.0
            }
        );
        assert_eq!(
            parse_command("/use Alice Right"),
            Command::Use {
                player: "Alice".to_string(),
                action: InteractAction::Secondary
            }
        );
    }

    #[test]
    fn reports_usage_errors() {
        assert_eq!(
            parse_command("/tp Alice 1 2"),
            Command::InvalidUsage("Usage: /tp <player|id> <x> <y> <z>".to_string())
        );
        assert_eq!(
            parse_command("/look Alice 0 120"),
            Command::InvalidUsage("Usage: /look <player|id> <yaw> [pitch]".to_string())
        );
        assert_eq!(
            parse_command("/use Alice jump"),
            Command::InvalidUsage("Usage: /use <player|id> <left|right|use>".to_string())
        );
        assert_eq!(
            parse_command("/loops"),
            Command::InvalidUsage("Usage: /loops <start|stop>".to_string())
        );
        assert_eq!(
            parse_command("/p1 Alice Bob"),
            Command::InvalidUsage("Usage: /p1 [player]".to_string())
        );
        assert_eq!(parse_command("/dance"), Command::Unknown("dance".to_string()));
    }
}
