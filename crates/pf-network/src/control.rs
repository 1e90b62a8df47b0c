//! Simple (single-condition) operational controls.

use crate::link::{Link, LinkStatus};
use crate::msglog::MsgLog;
use crate::node::Node;
use pf_core::clock::format_time;

/// What triggers the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// tank level crosses a trigger level
    TankLevel,
    /// node pressure crosses a trigger pressure
    PressureLevel,
    /// a given elapsed simulation time is reached
    ElapsedTime,
    /// a given time of day is reached
    TimeOfDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    Low,
    High,
}

/// The action applied to the target link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    Status(LinkStatus),
    Setting(f64),
}

#[derive(Debug, Clone)]
pub struct Control {
    pub name: String,
    pub kind: ControlKind,
    /// index of the controlled link
    pub link: usize,
    pub action: ControlAction,
    /// index of the trigger node (level and pressure controls)
    pub node: Option<usize>,
    /// trigger head (ft, internal units after conversion)
    pub head: f64,
    /// trigger volume for tank level controls (ft3)
    pub volume: f64,
    pub level_kind: LevelKind,
    /// trigger time (sec)
    pub time: i64,
}

impl Control {
    /// Fire the control if its condition currently holds.
    pub fn apply(
        &self,
        nodes: &[Node],
        links: &mut [Link],
        t: i64,
        time_of_day: i64,
        log: &mut MsgLog,
    ) {
        match self.kind {
            ControlKind::PressureLevel => {}
            ControlKind::TankLevel => {
                let node = &nodes[self.node.expect("tank control has a node")];
                if let Some(tank) = node.tank() {
                    // tolerance of one second's worth of flow on the level
                    let tol = node.outflow.abs();
                    let triggered = match self.level_kind {
                        LevelKind::Low => tank.volume <= self.volume + tol,
                        LevelKind::High => tank.volume >= self.volume - tol,
                    };
                    if triggered {
                        self.activate(nodes, links, true, log);
                    }
                }
            }
            ControlKind::ElapsedTime => {
                if t == self.time {
                    self.activate(nodes, links, true, log);
                }
            }
            ControlKind::TimeOfDay => {
                if time_of_day == self.time {
                    self.activate(nodes, links, true, log);
                }
            }
        }
    }

    /// Fire any pressure controls whose trigger currently holds.
    pub fn apply_pressure_controls(
        controls: &[Control],
        nodes: &[Node],
        links: &mut [Link],
        log: &mut MsgLog,
    ) {
        for control in controls {
            if control.kind != ControlKind::PressureLevel {
                continue;
            }
            let node = &nodes[control.node.expect("pressure control has a node")];
            let triggered = match control.level_kind {
                LevelKind::Low => node.head < control.head,
                LevelKind::High => node.head > control.head,
            };
            if triggered {
                control.activate(nodes, links, true, log);
            }
        }
    }

    /// Seconds until this control would fire, or None if it is not
    /// approaching activation.
    pub fn time_to_activate(
        &self,
        nodes: &[Node],
        links: &mut [Link],
        t: i64,
        time_of_day: i64,
        log: &mut MsgLog,
    ) -> Option<i64> {
        let a_time = match self.kind {
            ControlKind::PressureLevel => return None,
            ControlKind::TankLevel => {
                let node = &nodes[self.node?];
                let tank = node.tank()?;
                tank.time_to_volume(node.outflow, self.volume)?
            }
            ControlKind::ElapsedTime => self.time - t,
            ControlKind::TimeOfDay => {
                if self.time >= time_of_day {
                    self.time - time_of_day
                } else {
                    86_400 - time_of_day + self.time
                }
            }
        };
        if a_time > 0 && self.activate(nodes, links, false, log) {
            Some(a_time)
        } else {
            None
        }
    }

    /// Carry out (or probe, with `make_change` false) the control's action.
    fn activate(&self, nodes: &[Node], links: &mut [Link], make_change: bool, log: &mut MsgLog) -> bool {
        let link = &mut links[self.link];
        let link_str = format!("{} {}", link.type_str(), link.name);

        let cause = match self.kind {
            ControlKind::TankLevel => format!(
                " by level control on tank {}",
                nodes[self.node.expect("tank control has a node")].name
            ),
            ControlKind::PressureLevel => format!(
                " by pressure control on node {}",
                nodes[self.node.expect("pressure control has a node")].name
            ),
            ControlKind::ElapsedTime => " by elapsed time control".to_string(),
            ControlKind::TimeOfDay => " by time of day control".to_string(),
        };

        match self.action {
            ControlAction::Status(status) => {
                let reason = format!(
                    "{link_str} status changed to {}{cause}",
                    match status {
                        LinkStatus::Closed => "closed",
                        _ => "open",
                    }
                );
                link.change_status(status, make_change, &reason, log)
            }
            ControlAction::Setting(setting) => {
                let reason = format!("{link_str} setting changed to {setting}{cause}");
                link.change_setting(setting, make_change, &reason, log)
            }
        }
    }

    /// Render the control as an input-file line.
    pub fn to_input_line(&self, nodes: &[Node], links: &[Link], ucf_length: f64, ucf_pressure: f64) -> String {
        let mut s = format!("LINK {} ", links[self.link].name);
        match self.action {
            ControlAction::Status(LinkStatus::Closed) => s.push_str("CLOSED"),
            ControlAction::Status(_) => s.push_str("OPEN"),
            ControlAction::Setting(v) => s.push_str(&format!("{v}")),
        }
        match self.kind {
            ControlKind::TankLevel | ControlKind::PressureLevel => {
                let node = &nodes[self.node.expect("level control has a node")];
                let ucf = if self.kind == ControlKind::TankLevel {
                    ucf_length
                } else {
                    ucf_pressure
                };
                s.push_str(&format!(
                    " IF NODE {} {} {}",
                    node.name,
                    match self.level_kind {
                        LevelKind::Low => "BELOW",
                        LevelKind::High => "ABOVE",
                    },
                    (self.head - node.elev) * ucf
                ));
            }
            ControlKind::ElapsedTime => {
                s.push_str(&format!(" AT TIME {}", format_time(self.time)));
            }
            ControlKind::TimeOfDay => {
                s.push_str(&format!(" AT CLOCKTIME {}", format_time(self.time)));
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkKind;
    use crate::node::{NodeKind, Reservoir};
    use crate::pipe::Pipe;

    fn simple_net() -> (Vec<Node>, Vec<Link>) {
        let nodes = vec![
            Node::new("R1", NodeKind::Reservoir(Reservoir::default())),
            Node::new("J1", NodeKind::Junction(crate::junction::Junction::default())),
        ];
        let mut link = Link::new("P1", 0, 1, LinkKind::Pipe(Pipe::default()));
        link.initialize(false);
        (nodes, vec![link])
    }

    #[test]
    fn elapsed_time_control_fires_exactly_on_time() {
        let (nodes, mut links) = simple_net();
        let control = Control {
            name: "1".into(),
            kind: ControlKind::ElapsedTime,
            link: 0,
            action: ControlAction::Status(LinkStatus::Closed),
            node: None,
            head: 0.0,
            volume: 0.0,
            level_kind: LevelKind::Low,
            time: 7200,
        };
        let mut log = MsgLog::default();

        control.apply(&nodes, &mut links, 3600, 3600, &mut log);
        assert_eq!(links[0].status, LinkStatus::Open);

        control.apply(&nodes, &mut links, 7200, 7200, &mut log);
        assert_eq!(links[0].status, LinkStatus::Closed);
        assert_eq!(log.lines().len(), 1);
    }

    #[test]
    fn time_of_day_control_wraps_to_next_day() {
        let (nodes, mut links) = simple_net();
        let control = Control {
            name: "1".into(),
            kind: ControlKind::TimeOfDay,
            link: 0,
            action: ControlAction::Status(LinkStatus::Closed),
            node: None,
            head: 0.0,
            volume: 0.0,
            level_kind: LevelKind::Low,
            time: 3600,
        };
        let mut log = MsgLog::default();
        let t = control.time_to_activate(&nodes, &mut links, 0, 7200, &mut log);
        assert_eq!(t, Some(86_400 - 7200 + 3600));
    }
}
