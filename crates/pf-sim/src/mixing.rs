//! Tank mixing models over pooled segment chains.
//!
//! Each tank carries one of four blending behaviors. The segment chains
//! live in the quality engine's pool; this state owns only the chain heads.

use crate::segment::{SegId, SegPool};
use pf_models::ReactionModel;
use pf_network::MixingKind;

#[derive(Debug, Clone)]
pub struct TankMixState {
    pub kind: MixingKind,
    /// concentration tolerance for merging parcels
    c_tol: f64,
    /// mixing-zone capacity for the two-compartment model (ft3)
    v_mixed: f64,
    /// quality of water currently being released
    c_tank: f64,
    first: Option<SegId>,
    last: Option<SegId>,
}

impl TankMixState {
    /// Set up the tank's internal segments from its initial contents.
    pub fn init(
        kind: MixingKind,
        frac_mixed: f64,
        max_volume: f64,
        volume: f64,
        quality: f64,
        c_tol: f64,
        pool: &mut SegPool,
    ) -> Self {
        let v_mixed = frac_mixed * max_volume;
        let mut state = Self {
            kind,
            c_tol,
            v_mixed,
            c_tank: quality,
            first: None,
            last: None,
        };

        // one segment holding the whole tank
        let first = pool.alloc(volume, quality);
        state.first = Some(first);
        state.last = Some(first);

        // the two-compartment model splits it into stagnant + mixing zones
        if kind == MixingKind::Mix2 {
            let stagnant = (volume - v_mixed).max(0.0);
            pool.get_mut(first).volume = stagnant;
            let last = pool.alloc(volume - stagnant, quality);
            pool.get_mut(first).next = Some(last);
            state.last = Some(last);
        }
        state
    }

    /// Quality of the water the tank releases after one quality step with
    /// net volume change `v_net`, inflow volume `v_in` and inflow mass `w_in`.
    pub fn find_quality(&mut self, v_net: f64, v_in: f64, w_in: f64, pool: &mut SegPool) -> f64 {
        match self.kind {
            MixingKind::Mix2 => self.mix2_quality(v_net, v_in, w_in, pool),
            MixingKind::Fifo => self.fifo_quality(v_net, v_in, w_in, pool),
            MixingKind::Lifo => self.lifo_quality(v_net, v_in, w_in, pool),
            MixingKind::Mix1 => self.mix1_quality(v_net, v_in, w_in, pool),
        }
    }

    /// React the tank's contents, returning the mass removed.
    pub fn react(
        &mut self,
        model: &ReactionModel,
        bulk_coeff: f64,
        tstep: f64,
        pool: &mut SegPool,
    ) -> f64 {
        let mut mass_reacted = 0.0;
        let mut seg = self.first;
        while let Some(id) = seg {
            let s = pool.get(id);
            let c = s.concen;
            let v = s.volume;
            let next = s.next;
            let c_new = model.tank_react(bulk_coeff, c, tstep);
            pool.get_mut(id).concen = c_new;
            mass_reacted += (c - c_new) * v;
            seg = next;
        }
        mass_reacted
    }

    /// Total constituent mass stored.
    pub fn stored_mass(&self, pool: &SegPool) -> f64 {
        let mut total = 0.0;
        let mut seg = self.first;
        while let Some(id) = seg {
            let s = pool.get(id);
            total += s.concen * s.volume;
            seg = s.next;
        }
        total
    }

    fn mix1_quality(&mut self, v_net: f64, v_in: f64, w_in: f64, pool: &mut SegPool) -> f64 {
        let first = self.first.expect("mixed tank keeps one segment");
        let seg = pool.get_mut(first);
        let v_new = seg.volume + v_in;
        if v_new > 0.0 {
            seg.concen = (seg.concen * seg.volume + w_in) / v_new;
        }
        seg.volume += v_net;
        self.c_tank = seg.concen;
        self.c_tank
    }

    fn mix2_quality(&mut self, v_net: f64, v_in: f64, w_in: f64, pool: &mut SegPool) -> f64 {
        let stag_id = self.first.expect("two-compartment tank has a stagnant zone");
        let mix_id = self.last.expect("two-compartment tank has a mixing zone");
        let mut v_transfer = 0.0;

        if v_net > 0.0 {
            // filling: inflow mixes in, overflow spills to the stagnant zone
            let mix = pool.get(mix_id);
            v_transfer = (mix.volume + v_net - self.v_mixed).max(0.0);
            if v_in > 0.0 {
                let mix = pool.get_mut(mix_id);
                mix.concen = (mix.concen * mix.volume + w_in) / (mix.volume + v_in);
            }
            if v_transfer > 0.0 {
                let c_mix = pool.get(mix_id).concen;
                let stag = pool.get_mut(stag_id);
                stag.concen = (stag.concen * stag.volume + c_mix * v_transfer)
                    / (stag.volume + v_transfer);
            }
        } else if v_net < 0.0 {
            // emptying: the stagnant zone drains back into the mixing zone
            if pool.get(stag_id).volume > 0.0 {
                v_transfer = pool.get(stag_id).volume.min(-v_net);
            }
            if v_in + v_transfer > 0.0 {
                let c_stag = pool.get(stag_id).concen;
                let mix = pool.get_mut(mix_id);
                mix.concen = (mix.concen * mix.volume + w_in + c_stag * v_transfer)
                    / (mix.volume + v_in + v_transfer);
            }
        }

        if v_transfer > 0.0 {
            pool.get_mut(mix_id).volume = self.v_mixed;
            let stag = pool.get_mut(stag_id);
            if v_net > 0.0 {
                stag.volume += v_transfer;
            } else {
                stag.volume = (stag.volume - v_transfer).max(0.0);
            }
        } else {
            let v_mixed = self.v_mixed;
            let mix = pool.get_mut(mix_id);
            mix.volume = (mix.volume + v_net).clamp(0.0, v_mixed);
            pool.get_mut(stag_id).volume = 0.0;
        }

        self.c_tank = pool.get(mix_id).concen;
        self.c_tank
    }

    fn fifo_quality(&mut self, v_net: f64, v_in: f64, w_in: f64, pool: &mut SegPool) -> f64 {
        // inflow joins the back of the queue
        if v_in > 0.0 {
            let c_in = w_in / v_in;
            match self.last {
                Some(last) if (pool.get(last).concen - c_in).abs() < self.c_tol => {
                    pool.get_mut(last).volume += v_in;
                }
                _ => {
                    let seg = pool.alloc(v_in, c_in);
                    if self.first.is_none() {
                        self.first = Some(seg);
                    }
                    if let Some(last) = self.last {
                        pool.get_mut(last).next = Some(seg);
                    }
                    self.last = Some(seg);
                }
            }
        }

        // withdraw from the front
        let mut v_sum = 0.0;
        let mut w_sum = 0.0;
        let mut v_out = v_in - v_net;
        while v_out > 0.0 {
            let Some(id) = self.first else { break };
            let seg = pool.get(id);
            let mut v_seg = seg.volume.min(v_out);
            if Some(id) == self.last {
                v_seg = v_out;
            }
            v_sum += v_seg;
            w_sum += seg.concen * v_seg;
            v_out -= v_seg;
            if v_out >= 0.0 && v_seg >= seg.volume && seg.next.is_some() {
                self.first = seg.next;
                pool.free(id);
            } else {
                pool.get_mut(id).volume -= v_seg;
            }
        }

        self.c_tank = if v_sum > 0.0 {
            w_sum / v_sum
        } else if let Some(first) = self.first {
            pool.get(first).concen
        } else {
            0.0
        };
        self.c_tank
    }

    fn lifo_quality(&mut self, v_net: f64, v_in: f64, w_in: f64, pool: &mut SegPool) -> f64 {
        if v_net > 0.0 {
            // filling stacks a new parcel on top
            let c_in = if v_in > 0.0 { w_in / v_in } else { 0.0 };
            match self.first {
                Some(first) if (pool.get(first).concen - c_in).abs() < self.c_tol => {
                    pool.get_mut(first).volume += v_net;
                }
                _ => {
                    let seg = pool.alloc(v_net, c_in);
                    pool.get_mut(seg).next = self.first;
                    self.first = Some(seg);
                }
            }
            self.c_tank = pool.get(self.first.expect("just stacked")).concen;
        } else if v_net < 0.0 {
            // emptying drains parcels off the top
            let mut v_sum = 0.0;
            let mut w_sum = 0.0;
            let mut v_rem = -v_net;
            while v_rem > 0.0 {
                let Some(id) = self.first else { break };
                let seg = pool.get(id);
                let mut v_seg = seg.volume.min(v_rem);
                if seg.next.is_none() {
                    v_seg = v_rem;
                }
                v_sum += v_seg;
                w_sum += seg.concen * v_seg;
                v_rem -= v_seg;
                if v_rem >= 0.0 && v_seg >= seg.volume && seg.next.is_some() {
                    self.first = seg.next;
                    pool.free(id);
                } else {
                    pool.get_mut(id).volume -= v_seg;
                }
            }
            // released quality blends the drained parcels with any inflow
            self.c_tank = (w_sum + w_in) / (v_sum + v_in);
        }
        self.c_tank
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> SegPool {
        SegPool::new()
    }

    #[test]
    fn mix1_blends_inflow_mass() {
        let mut pool = pool();
        let mut tank = TankMixState::init(MixingKind::Mix1, 1.0, 1000.0, 500.0, 1.0, 1e-4, &mut pool);
        // 100 ft3 of clean water flows in, 100 ft3 leaves: volume unchanged
        let c = tank.find_quality(0.0, 100.0, 0.0, &mut pool);
        let expected = 500.0 / 600.0;
        assert!((c - expected).abs() < 1e-12);
        assert!((tank.stored_mass(&pool) - expected * 500.0).abs() < 1e-9);
    }

    #[test]
    fn mix2_keeps_stagnant_zone_out_of_outflow() {
        let mut pool = pool();
        // mixing zone capacity 200 of a 1000 ft3 tank holding 600 ft3
        let mut tank = TankMixState::init(MixingKind::Mix2, 0.2, 1000.0, 600.0, 1.0, 1e-4, &mut pool);
        // drain 100 ft3 with clean inflow of 50
        let c = tank.find_quality(-50.0, 50.0, 0.0, &mut pool);
        // outflow quality comes from the mixing zone only
        assert!(c > 0.0 && c < 1.0);
        // stagnant zone shrank by the transfer volume
        assert!((pool.get(tank.first.unwrap()).volume - 350.0).abs() < 1e-9);
    }

    #[test]
    fn fifo_releases_oldest_water_first() {
        let mut pool = pool();
        let mut tank = TankMixState::init(MixingKind::Fifo, 1.0, 1000.0, 100.0, 2.0, 1e-4, &mut pool);
        // push in 50 ft3 of clean water while 50 ft3 leaves
        let c = tank.find_quality(0.0, 50.0, 0.0, &mut pool);
        // what left is pure old water at c = 2
        assert!((c - 2.0).abs() < 1e-12);
        // now drain 80 more: 50 old + 30 new
        let c = tank.find_quality(-80.0, 0.0, 0.0, &mut pool);
        assert!((c - (50.0 * 2.0) / 80.0).abs() < 1e-9);
    }

    #[test]
    fn lifo_releases_newest_water_first() {
        let mut pool = pool();
        let mut tank = TankMixState::init(MixingKind::Lifo, 1.0, 1000.0, 100.0, 2.0, 1e-4, &mut pool);
        // stack 50 ft3 of clean water
        tank.find_quality(50.0, 50.0, 0.0, &mut pool);
        // drain 30: comes from the clean parcel on top
        let c = tank.find_quality(-30.0, 0.0, 0.0, &mut pool);
        assert!((c - 0.0).abs() < 1e-12);
        // drain 40 more: 20 clean + 20 old
        let c = tank.find_quality(-40.0, 0.0, 0.0, &mut pool);
        assert!((c - (20.0 * 2.0) / 40.0).abs() < 1e-9);
    }

    #[test]
    fn reaction_reports_mass_removed() {
        let mut pool = pool();
        let mut tank = TankMixState::init(MixingKind::Mix1, 1.0, 1000.0, 500.0, 1.0, 1e-4, &mut pool);
        let model = ReactionModel::Chemical(pf_models::ChemicalReaction::default());
        // 1/day decay over an hour
        let removed = tank.react(&model, -1.0, 3600.0, &mut pool);
        assert!(removed > 0.0);
        assert!((tank.stored_mass(&pool) - (500.0 - removed)).abs() < 1e-9);
    }
}
