//! Network links: a shared computed-state header plus a tagged variant for
//! pipes, pumps, and valves.

use crate::curve::Curve;
use crate::msglog::MsgLog;
use crate::pattern::Pattern;
use crate::pipe::Pipe;
use crate::pump::Pump;
use crate::valve::{next_prv_status, next_psv_status, open_head_loss, Valve, ValveKind};
use pf_core::constants::{HIGH_RESISTANCE, MIN_GRADIENT, ZERO_FLOW};
use pf_core::{Quantity, Units};
use pf_models::headloss::{add_cv_head_loss, closed_head_loss, HeadLossModel, PipeHydraulics};
use pf_models::LeakageModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Pipe,
    Pump,
    Valve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Closed,
    Open,
    /// a pressure regulating valve holding its setpoint
    Active,
    /// closed by the solver (empty/full tank, pressure switch), not the user
    TempClosed,
}

impl LinkStatus {
    pub fn label(self) -> &'static str {
        match self {
            LinkStatus::Closed => "CLOSED",
            LinkStatus::Open => "OPEN",
            LinkStatus::Active => "ACTIVE",
            LinkStatus::TempClosed => "TEMP_CLOSED",
        }
    }

    /// Ordinal recorded in the binary output file.
    pub fn ordinal(self) -> i32 {
        match self {
            LinkStatus::Closed => 0,
            LinkStatus::Open => 1,
            LinkStatus::Active => 2,
            LinkStatus::TempClosed => 3,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, LinkStatus::Closed | LinkStatus::TempClosed)
    }
}

#[derive(Debug, Clone)]
pub enum LinkKind {
    Pipe(Pipe),
    Pump(Pump),
    Valve(Valve),
}

/// Everything a link needs from the rest of the project to evaluate its
/// head loss (GPV and custom pump curves read user-unit curve data).
#[derive(Clone, Copy)]
pub struct LinkEvalContext<'a> {
    pub headloss: HeadLossModel,
    pub curves: &'a [Curve],
    pub ucf_flow: f64,
    pub ucf_head: f64,
}

#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    pub rpt_flag: bool,
    /// index of the start node
    pub from_node: usize,
    /// index of the end node
    pub to_node: usize,
    pub init_status: LinkStatus,
    pub init_setting: f64,
    /// diameter (ft)
    pub diameter: f64,
    /// minor head loss coefficient (velocity-head basis)
    pub loss_coeff: f64,

    // computed state
    pub status: LinkStatus,
    /// flow rate (cfs)
    pub flow: f64,
    /// leakage rate (cfs)
    pub leakage: f64,
    /// head loss (ft)
    pub hloss: f64,
    /// head loss gradient (ft/cfs); zero flags an active PRV/PSV
    pub hgrad: f64,
    /// current speed or valve setting
    pub setting: f64,
    /// average quality concentration (mass/ft3)
    pub quality: f64,

    pub kind: LinkKind,
}

impl Link {
    pub fn new(name: impl Into<String>, from_node: usize, to_node: usize, kind: LinkKind) -> Self {
        let init_status = match &kind {
            LinkKind::Valve(_) => LinkStatus::Active,
            _ => LinkStatus::Open,
        };
        let init_setting = match &kind {
            LinkKind::Valve(_) => 0.0,
            _ => 1.0,
        };
        Self {
            name: name.into(),
            rpt_flag: false,
            from_node,
            to_node,
            init_status,
            init_setting,
            diameter: 0.0,
            loss_coeff: 0.0,
            status: LinkStatus::Open,
            flow: 0.0,
            leakage: 0.0,
            hloss: 0.0,
            hgrad: 0.0,
            setting: 0.0,
            quality: 0.0,
            kind,
        }
    }

    pub fn link_type(&self) -> LinkType {
        match self.kind {
            LinkKind::Pipe(_) => LinkType::Pipe,
            LinkKind::Pump(_) => LinkType::Pump,
            LinkKind::Valve(_) => LinkType::Valve,
        }
    }

    pub fn type_str(&self) -> &'static str {
        match &self.kind {
            LinkKind::Pipe(_) => "Pipe",
            LinkKind::Pump(_) => "Pump",
            LinkKind::Valve(v) => v.kind.label(),
        }
    }

    pub fn pipe(&self) -> Option<&Pipe> {
        match &self.kind {
            LinkKind::Pipe(p) => Some(p),
            _ => None,
        }
    }

    pub fn pipe_mut(&mut self) -> Option<&mut Pipe> {
        match &mut self.kind {
            LinkKind::Pipe(p) => Some(p),
            _ => None,
        }
    }

    pub fn pump(&self) -> Option<&Pump> {
        match &self.kind {
            LinkKind::Pump(p) => Some(p),
            _ => None,
        }
    }

    pub fn pump_mut(&mut self) -> Option<&mut Pump> {
        match &mut self.kind {
            LinkKind::Pump(p) => Some(p),
            _ => None,
        }
    }

    pub fn valve(&self) -> Option<&Valve> {
        match &self.kind {
            LinkKind::Valve(v) => Some(v),
            _ => None,
        }
    }

    pub fn valve_mut(&mut self) -> Option<&mut Valve> {
        match &mut self.kind {
            LinkKind::Valve(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_prv(&self) -> bool {
        matches!(&self.kind, LinkKind::Valve(v) if v.kind == ValveKind::Prv)
    }

    pub fn is_psv(&self) -> bool {
        matches!(&self.kind, LinkKind::Valve(v) if v.kind == ValveKind::Psv)
    }

    pub fn is_hp_pump(&self) -> bool {
        matches!(&self.kind, LinkKind::Pump(p) if p.curve.is_const_hp())
    }

    pub fn is_reactive(&self) -> bool {
        matches!(&self.kind, LinkKind::Pipe(p) if p.is_reactive())
    }

    pub fn can_leak(&self) -> bool {
        matches!(&self.kind, LinkKind::Pipe(p) if p.can_leak())
    }

    fn flow_area(&self) -> f64 {
        std::f64::consts::PI * self.diameter * self.diameter / 4.0
    }

    /// Reset status/setting/flow for the start of a run.
    pub fn initialize(&mut self, re_init_flow: bool) {
        self.status = self.init_status;
        self.setting = self.init_setting;
        if let LinkKind::Pump(p) = &mut self.kind {
            p.speed = self.init_setting;
            p.energy.init();
        }
        if let LinkKind::Valve(v) = &mut self.kind {
            v.has_fixed_status = self.init_status != LinkStatus::Active;
        }
        if re_init_flow {
            if self.status == LinkStatus::Closed {
                self.flow = ZERO_FLOW;
            } else {
                self.set_init_flow();
            }
        }
        self.leakage = 0.0;
    }

    /// Seed the flow for the first hydraulic iteration.
    pub fn set_init_flow(&mut self) {
        match &self.kind {
            // flow at a velocity of 1 ft/s
            LinkKind::Pipe(_) => self.flow = self.flow_area(),
            LinkKind::Pump(p) => self.flow = p.curve.q_init * self.init_setting,
            LinkKind::Valve(v) => {
                self.flow = if v.kind == ValveKind::Fcv {
                    self.setting
                } else {
                    self.flow_area()
                };
            }
        }
    }

    /// Precompute a pipe's head loss resistance.
    pub fn set_resistance(&mut self, model: &HeadLossModel) {
        let diameter = self.diameter;
        if let LinkKind::Pipe(p) = &mut self.kind {
            let hydraulics = PipeHydraulics {
                length: p.length,
                diameter,
                roughness: p.roughness,
                resistance: 0.0,
                loss_factor: p.loss_factor,
            };
            p.resistance = model.resistance(&hydraulics);
        }
    }

    /// Evaluate head loss and its gradient at trial flow `q`, storing the
    /// results in `self.hloss` / `self.hgrad`.
    pub fn find_head_loss(&mut self, ctx: &LinkEvalContext, q: f64) {
        match &self.kind {
            LinkKind::Pipe(p) => {
                if self.status.is_closed() {
                    let (h, g) = closed_head_loss(q);
                    self.hloss = h;
                    self.hgrad = g;
                } else {
                    let hydraulics = PipeHydraulics {
                        length: p.length,
                        diameter: self.diameter,
                        roughness: p.roughness,
                        resistance: p.resistance,
                        loss_factor: p.loss_factor,
                    };
                    let (mut h, mut g) = ctx.headloss.find_head_loss(&hydraulics, q);
                    if p.has_check_valve {
                        add_cv_head_loss(q, &mut h, &mut g);
                    }
                    self.hloss = h;
                    self.hgrad = g;
                }
            }
            LinkKind::Pump(p) => {
                if p.speed == 0.0 || self.status.is_closed() {
                    let (h, g) = closed_head_loss(q);
                    self.hloss = h;
                    self.hgrad = g;
                } else {
                    let (mut h, mut g) = p.curve.find_head_loss(ctx.curves, p.speed, q);
                    if !p.curve.is_const_hp() {
                        add_cv_head_loss(q, &mut h, &mut g);
                    }
                    self.hloss = h;
                    self.hgrad = g;
                }
            }
            LinkKind::Valve(v) => {
                let (h, g) = self.valve_head_loss(v, ctx, q);
                self.hloss = h;
                self.hgrad = g;
            }
        }
    }

    fn valve_head_loss(&self, v: &Valve, ctx: &LinkEvalContext, q: f64) -> (f64, f64) {
        if self.status == LinkStatus::TempClosed {
            return closed_head_loss(q);
        }

        if v.has_fixed_status {
            return match self.status {
                LinkStatus::Closed => closed_head_loss(q),
                _ => open_head_loss(v.loss_factor, q),
            };
        }

        match v.kind {
            ValveKind::Pbv => {
                // acts as an open valve until the minor loss falls below
                // the forced head drop
                let mloss = v.loss_factor * q * q;
                if mloss >= self.setting.abs() {
                    open_head_loss(v.loss_factor, q)
                } else {
                    (self.setting, MIN_GRADIENT)
                }
            }
            ValveKind::Tcv => {
                // convert the throttled loss coefficient to a loss factor,
                // never dropping below the fully open factor
                let d2 = self.diameter * self.diameter;
                let factor = (0.025173 * self.setting / d2 / d2).max(v.loss_factor);
                open_head_loss(factor, q)
            }
            ValveKind::Gpv => {
                // the loss curve is in user units
                let curve = &ctx.curves[self.setting as usize];
                let q_user = q.abs() * ctx.ucf_flow;
                let (mut r, mut h0) = curve.find_segment(q_user);
                r *= ctx.ucf_flow / ctx.ucf_head;
                h0 /= ctx.ucf_head;
                let mut hloss = h0 + r * q.abs();
                if q < 0.0 {
                    hloss = -hloss;
                }
                (hloss, r)
            }
            ValveKind::Fcv => {
                let xflow = q - self.setting;
                if xflow > 0.0 {
                    // a steep penalty on the flow excess
                    (
                        v.loss_factor * self.setting * self.setting + HIGH_RESISTANCE * xflow,
                        HIGH_RESISTANCE,
                    )
                } else if q < 0.0 {
                    closed_head_loss(q)
                } else {
                    open_head_loss(v.loss_factor, q)
                }
            }
            ValveKind::Prv | ValveKind::Psv => match self.status {
                LinkStatus::Closed => closed_head_loss(q),
                LinkStatus::Open => open_head_loss(v.loss_factor, q),
                // when active the link drops out of the gradient system;
                // a zero gradient is the flag the solver keys on
                _ => (0.0, 0.0),
            },
        }
    }

    /// Run the PRV/PSV state machine for the current trial solution.
    pub fn update_status(&mut self, q: f64, h1: f64, h2: f64) {
        let (kind, has_fixed, elev) = match &self.kind {
            LinkKind::Valve(v) => (v.kind, v.has_fixed_status, v.elev),
            _ => return,
        };
        if has_fixed {
            return;
        }
        let h_set = self.setting + elev;
        let new_status = match kind {
            ValveKind::Prv => next_prv_status(self.status, q, h1, h2, h_set),
            ValveKind::Psv => next_psv_status(self.status, q, h1, h2, h_set),
            _ => return,
        };
        if new_status != self.status {
            if new_status == LinkStatus::Closed {
                self.flow = ZERO_FLOW;
            }
            self.status = new_status;
        }
    }

    /// Apply a commanded status change. Returns true when anything would
    /// change (controls use `make_change = false` to probe).
    pub fn change_status(
        &mut self,
        new_status: LinkStatus,
        make_change: bool,
        reason: &str,
        log: &mut MsgLog,
    ) -> bool {
        match &mut self.kind {
            LinkKind::Pipe(_) => {
                if self.status != new_status {
                    if make_change {
                        log.push(format!("    {reason}"));
                        self.status = new_status;
                    }
                    return true;
                }
                false
            }
            LinkKind::Pump(p) => {
                if self.status != new_status {
                    if make_change {
                        if new_status == LinkStatus::Open && p.speed == 0.0 {
                            p.speed = 1.0;
                        }
                        if new_status == LinkStatus::Closed {
                            self.flow = ZERO_FLOW;
                        }
                        log.push(format!("    {reason}"));
                        self.status = new_status;
                    }
                    return true;
                }
                false
            }
            LinkKind::Valve(v) => {
                if !v.has_fixed_status || self.status != new_status {
                    if make_change {
                        log.push(format!("    {reason}"));
                        self.status = new_status;
                        v.has_fixed_status = true;
                        if new_status == LinkStatus::Closed {
                            self.flow = ZERO_FLOW;
                        }
                    }
                    return true;
                }
                false
            }
        }
    }

    /// Apply a commanded setting change (pump speed or valve setting).
    pub fn change_setting(
        &mut self,
        new_setting: f64,
        make_change: bool,
        reason: &str,
        log: &mut MsgLog,
    ) -> bool {
        match &mut self.kind {
            LinkKind::Pipe(_) => false,
            LinkKind::Pump(p) => {
                if p.speed != new_setting {
                    if self.status == LinkStatus::Closed && new_setting == 0.0 {
                        p.speed = new_setting;
                        self.setting = new_setting;
                        return false;
                    }
                    if make_change {
                        if new_setting == 0.0 {
                            self.status = LinkStatus::Closed;
                            self.flow = ZERO_FLOW;
                        } else {
                            self.status = LinkStatus::Open;
                        }
                        p.speed = new_setting;
                        self.setting = new_setting;
                        log.push(format!("    {reason}"));
                    }
                    return true;
                }
                false
            }
            LinkKind::Valve(_) => {
                if self.setting != new_setting {
                    if self.status == LinkStatus::Closed {
                        self.setting = new_setting;
                        return false;
                    }
                    if make_change {
                        if new_setting == 0.0 {
                            self.status = LinkStatus::Closed;
                            self.flow = ZERO_FLOW;
                        } else {
                            self.status = LinkStatus::Open;
                        }
                        self.setting = new_setting;
                        log.push(format!("    {reason}"));
                    }
                    return true;
                }
                false
            }
        }
    }

    /// Apply a pattern-driven pump speed or valve setting for the current
    /// time period.
    pub fn apply_control_pattern(&mut self, patterns: &[Pattern], log: &mut MsgLog) {
        let pattern = match &self.kind {
            LinkKind::Pump(p) => p.speed_pattern,
            LinkKind::Valve(v) => v.setting_pattern,
            LinkKind::Pipe(_) => None,
        };
        if let Some(pid) = pattern {
            let factor = patterns[pid.index()].current_factor();
            let what = match self.link_type() {
                LinkType::Pump => "speed pattern",
                _ => "setting pattern",
            };
            let reason = format!("{} {} {} changed to {:.4}", self.type_str(), self.name, what, factor);
            self.change_setting(factor, true, &reason, log);
        }
    }

    pub fn get_velocity(&self) -> f64 {
        match &self.kind {
            LinkKind::Pump(_) => 0.0,
            _ => self.flow.abs() / self.flow_area(),
        }
    }

    /// Head loss per 1000 length units for pipes; plain head loss otherwise.
    pub fn get_unit_head_loss(&self) -> f64 {
        if let LinkKind::Pipe(p) = &self.kind {
            if p.length > 0.0 {
                return self.hloss.abs() * 1000.0 / p.length;
            }
            return 0.0;
        }
        self.hloss
    }

    /// Interior water volume (pipes only).
    pub fn get_volume(&self) -> f64 {
        match &self.kind {
            LinkKind::Pipe(p) => self.flow_area() * p.length,
            _ => 0.0,
        }
    }

    /// Reynolds number of the current flow.
    pub fn get_re(&self, q: f64, viscosity: f64) -> f64 {
        q.abs() / self.flow_area() * self.diameter / viscosity
    }

    /// The link's setting expressed in user units.
    pub fn get_setting(&self, units: &Units) -> f64 {
        match &self.kind {
            LinkKind::Valve(v) => match v.kind {
                ValveKind::Prv | ValveKind::Psv | ValveKind::Pbv => {
                    self.setting * units.factor(Quantity::Pressure)
                }
                ValveKind::Fcv => self.setting * units.factor(Quantity::Flow),
                _ => self.setting,
            },
            _ => self.setting,
        }
    }

    /// Pipe leakage flow at average pressure head `h` plus its half-gradient.
    pub fn find_leakage(&self, model: &LeakageModel, h: f64) -> (f64, f64) {
        match &self.kind {
            LinkKind::Pipe(p) => model.find_flow(p.leak_coeff1, p.leak_coeff2, p.length, h),
            _ => (0.0, 0.0),
        }
    }

    pub fn write_status_change(&self, old_status: LinkStatus) -> String {
        format!(
            "    {} {} status changed from {} to {}",
            self.type_str(),
            self.name,
            old_status.label(),
            self.status.label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_models::headloss::HeadLossKind;

    fn eval_ctx(curves: &[Curve]) -> LinkEvalContext<'_> {
        LinkEvalContext {
            headloss: HeadLossModel::new(HeadLossKind::HazenWilliams, 1.1e-5),
            curves,
            ucf_flow: 1.0,
            ucf_head: 1.0,
        }
    }

    fn test_pipe() -> Link {
        let mut link = Link::new(
            "P1",
            0,
            1,
            LinkKind::Pipe(Pipe {
                length: 1000.0,
                roughness: 100.0,
                ..Default::default()
            }),
        );
        link.diameter = 1.0;
        link.set_resistance(&HeadLossModel::new(HeadLossKind::HazenWilliams, 1.1e-5));
        link.initialize(true);
        link
    }

    #[test]
    fn closed_pipe_uses_high_resistance_stub() {
        let mut link = test_pipe();
        link.status = LinkStatus::Closed;
        link.find_head_loss(&eval_ctx(&[]), 0.001);
        assert_eq!(link.hgrad, HIGH_RESISTANCE);
        assert!((link.hloss - HIGH_RESISTANCE * 0.001).abs() < 1e-6);
    }

    #[test]
    fn pipe_initial_flow_is_unit_velocity() {
        let link = test_pipe();
        let area = std::f64::consts::PI / 4.0;
        assert!((link.flow - area).abs() < 1e-12);
    }

    #[test]
    fn fcv_penalizes_excess_flow() {
        let mut link = Link::new("V1", 0, 1, LinkKind::Valve(Valve::new(ValveKind::Fcv)));
        link.diameter = 1.0;
        link.setting = 2.0;
        link.find_head_loss(&eval_ctx(&[]), 3.0);
        assert_eq!(link.hgrad, HIGH_RESISTANCE);
        assert!(link.hloss > HIGH_RESISTANCE * 0.9);

        link.find_head_loss(&eval_ctx(&[]), 1.0);
        assert!(link.hgrad < 1.0);
    }

    #[test]
    fn active_prv_flags_zero_gradient() {
        let mut link = Link::new("V1", 0, 1, LinkKind::Valve(Valve::new(ValveKind::Prv)));
        link.status = LinkStatus::Active;
        link.find_head_loss(&eval_ctx(&[]), 0.5);
        assert_eq!(link.hgrad, 0.0);
        assert_eq!(link.hloss, 0.0);
    }

    #[test]
    fn pump_with_zero_speed_is_closed() {
        let mut link = Link::new("PU1", 0, 1, LinkKind::Pump(Pump::default()));
        link.pump_mut().unwrap().speed = 0.0;
        link.status = LinkStatus::Open;
        link.find_head_loss(&eval_ctx(&[]), 0.5);
        assert_eq!(link.hgrad, HIGH_RESISTANCE);
    }

    #[test]
    fn change_status_logs_reason_once() {
        let mut link = test_pipe();
        let mut log = MsgLog::default();
        assert!(link.change_status(LinkStatus::Closed, true, "test close", &mut log));
        assert_eq!(link.status, LinkStatus::Closed);
        assert!(!link.change_status(LinkStatus::Closed, true, "again", &mut log));
        assert_eq!(log.lines().len(), 1);
    }

    #[test]
    fn pump_setting_zero_closes_it() {
        let mut link = Link::new("PU1", 0, 1, LinkKind::Pump(Pump::default()));
        link.initialize(false);
        let mut log = MsgLog::default();
        assert!(link.change_setting(0.0, true, "speed to 0", &mut log));
        assert_eq!(link.status, LinkStatus::Closed);
        assert_eq!(link.flow, ZERO_FLOW);
    }
}
