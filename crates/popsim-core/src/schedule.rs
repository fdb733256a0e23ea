//! Delayed invocation by tick countdown.
//!
//! A `TickSchedule` maps a fixed set of slot indices to "fire in N ticks".
//! Entities keep one schedule for their behavior scripts and one for their
//! render scripts; the world keeps one for its periodic scripts.
//!
//! The scan is a flat O(slots) pass, not a priority queue. Slot counts are
//! bounded by the number of scripts attached to one entity type.

use thiserror::Error;

/// Countdown value of a slot that is not armed.
const INACTIVE: i64 = -1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule slot {slot} out of range ({slots} slots)")]
    SlotOutOfRange { slot: usize, slots: usize },
}

/// Flat countdown array, one entry per slot.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    countdowns: Vec<i64>,
}

impl TickSchedule {
    /// Create a schedule with `slots` inactive slots.
    pub fn new(slots: usize) -> Self {
        Self {
            countdowns: vec![INACTIVE; slots],
        }
    }

    pub fn slots(&self) -> usize {
        self.countdowns.len()
    }

    /// Arm `slot` to fire on the `delay`-th subsequent tick.
    ///
    /// Overwrites any pending countdown for the slot. A delay of zero fires on
    /// the next tick.
    pub fn schedule(&mut self, slot: usize, delay: u64) -> Result<(), ScheduleError> {
        let slots = self.countdowns.len();
        let countdown = self
            .countdowns
            .get_mut(slot)
            .ok_or(ScheduleError::SlotOutOfRange { slot, slots })?;
        *countdown = delay.clamp(1, i64::MAX as u64) as i64;
        Ok(())
    }

    /// Disarm `slot`. Disarming an inactive slot is a no-op.
    pub fn cancel(&mut self, slot: usize) -> Result<(), ScheduleError> {
        let slots = self.countdowns.len();
        let countdown = self
            .countdowns
            .get_mut(slot)
            .ok_or(ScheduleError::SlotOutOfRange { slot, slots })?;
        *countdown = INACTIVE;
        Ok(())
    }

    /// Ticks remaining before `slot` fires, or `None` if it is not armed.
    pub fn countdown(&self, slot: usize) -> Option<u64> {
        match self.countdowns.get(slot) {
            Some(&c) if c > 0 => Some(c as u64),
            _ => None,
        }
    }

    /// Advance every armed slot by one tick and return the slots that fired,
    /// in ascending order. Fired slots are disarmed before they are returned,
    /// so callers may re-arm them while dispatching.
    pub fn tick(&mut self) -> Vec<usize> {
        let mut fired = Vec::new();
        for (slot, countdown) in self.countdowns.iter_mut().enumerate() {
            if *countdown > 0 {
                *countdown -= 1;
                if *countdown == 0 {
                    *countdown = INACTIVE;
                    fired.push(slot);
                }
            }
        }
        fired
    }

    /// Advance one tick and invoke `notify` for each slot that fires.
    ///
    /// Stops at the first error; slots after the failing one keep their
    /// countdown for this tick.
    pub fn tick_with<E>(
        &mut self,
        mut notify: impl FnMut(usize) -> Result<(), E>,
    ) -> Result<(), E> {
        for slot in 0..self.countdowns.len() {
            let countdown = &mut self.countdowns[slot];
            if *countdown > 0 {
                *countdown -= 1;
                if *countdown == 0 {
                    *countdown = INACTIVE;
                    notify(slot)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_exactly_on_nth_tick() {
        let mut schedule = TickSchedule::new(3);
        schedule.schedule(1, 4).unwrap();

        for tick in 1..=3 {
            assert!(schedule.tick().is_empty(), "fired early on tick {tick}");
        }
        assert_eq!(schedule.tick(), vec![1]);
        // Disarmed after firing.
        for _ in 0..10 {
            assert!(schedule.tick().is_empty());
        }
    }

    #[test]
    fn unscheduled_slot_never_fires() {
        let mut schedule = TickSchedule::new(2);
        for _ in 0..100 {
            assert!(schedule.tick().is_empty());
        }
    }

    #[test]
    fn last_write_wins() {
        let mut schedule = TickSchedule::new(1);
        schedule.schedule(0, 2).unwrap();
        schedule.schedule(0, 5).unwrap();
        let fired_at: Vec<usize> = (1..=6).filter(|_| !schedule.tick().is_empty()).collect();
        assert_eq!(fired_at.len(), 1);
        assert_eq!(schedule.countdown(0), None);
    }

    #[test]
    fn zero_delay_fires_next_tick() {
        let mut schedule = TickSchedule::new(1);
        schedule.schedule(0, 0).unwrap();
        assert_eq!(schedule.tick(), vec![0]);
    }

    #[test]
    fn cancel_disarms() {
        let mut schedule = TickSchedule::new(1);
        schedule.schedule(0, 1).unwrap();
        schedule.cancel(0).unwrap();
        assert!(schedule.tick().is_empty());
    }

    #[test]
    fn out_of_range_slot() {
        let mut schedule = TickSchedule::new(2);
        assert_eq!(
            schedule.schedule(2, 1),
            Err(ScheduleError::SlotOutOfRange { slot: 2, slots: 2 })
        );
    }

    #[test]
    fn tick_with_notifies_in_slot_order() {
        let mut schedule = TickSchedule::new(3);
        schedule.schedule(2, 1).unwrap();
        schedule.schedule(0, 1).unwrap();
        let mut seen = Vec::new();
        schedule
            .tick_with(|slot| {
                seen.push(slot);
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(seen, vec![0, 2]);
    }

    #[test]
    fn tick_with_stops_on_error() {
        let mut schedule = TickSchedule::new(2);
        schedule.schedule(0, 1).unwrap();
        schedule.schedule(1, 1).unwrap();
        let result = schedule.tick_with(|slot| if slot == 0 { Err(slot) } else { Ok(()) });
        assert_eq!(result, Err(0));
        // Slot 1 was not advanced this tick.
        assert_eq!(schedule.countdown(1), Some(1));
    }
}
