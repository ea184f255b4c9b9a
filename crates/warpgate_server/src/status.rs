use glam::DVec3;
use warpgate_shared::portal::{Portal, PortalColor, PortalPair};

use crate::host::{Notice, NoticeColor};
use crate::portal_gun::Shot;

pub fn format_position(position: DVec3) -> String {
    format!("({:.1}, {:.1}, {:.1})", position.x, position.y, position.z)
}

/// Confirmation sent after a portal is created.
pub fn placement_notice(shot: &Shot) -> Notice {
    let portal = &shot.created.portal;
    Notice::new(
        format!(
            "{} portal placed at {}",
            portal.color(),
            format_position(portal.anchor())
        ),
        portal.color().into(),
    )
}

/// Extra line when the shot found nothing to attach to.
pub fn fallback_notice() -> Notice {
    Notice::new("No surface found, portal placed in front of you", NoticeColor::Gray)
}

/// Portal report for one agent. `viewer` adds distances when known.
pub fn status_notices(pair: Option<&PortalPair>, viewer: Option<DVec3>) -> Vec<Notice> {
    let mut lines = vec![Notice::new("=== Portal Status ===", NoticeColor::Gold).bold()];
    let Some(pair) = pair else {
        lines.push(Notice::new("No portals placed", NoticeColor::Gray));
        return lines;
    };

    for color in PortalColor::ALL {
        match pair.get(color) {
            Some(portal) => lines.push(portal_line(portal, viewer)),
            None => lines.push(Notice::new(format!("{color}: not placed"), NoticeColor::Gray)),
        }
    }

    lines.push(if pair.has_both() {
        Notice::new("Teleportation: ACTIVE", NoticeColor::Green)
    } else {
        Notice::new("Teleportation: INACTIVE (place both portals)", NoticeColor::Red)
    });
    lines
}

fn portal_line(portal: &Portal, viewer: Option<DVec3>) -> Notice {
    let mut text = format!(
        "{}: {} in '{}', center {}",
        portal.color(),
        format_position(portal.anchor()),
        portal.world(),
        format_position(portal.center())
    );
    if let Some(viewer) = viewer {
        text.push_str(&format!(", {:.1} blocks away", viewer.distance(portal.center())));
    }
    Notice::new(text, portal.color().into())
}

pub fn portal_gun_help(item: &str) -> Vec<Notice> {
    vec![
        Notice::new("=== Portal Gun ===", NoticeColor::Gold).bold(),
        Notice::new(format!("Hold {item} and aim at a wall"), NoticeColor::White),
        Notice::new("Left click: place blue portal", NoticeColor::Blue),
        Notice::new("Right click: place orange portal", NoticeColor::Orange),
        Notice::new("Walk into either portal to teleport to the other", NoticeColor::Aqua),
        Notice::new("/p1, /p2 place portals where you look", NoticeColor::Gray),
        Notice::new("/portalclear [blue|orange|all] removes them", NoticeColor::Gray),
    ]
}
