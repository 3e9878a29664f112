//! Booking wizard state machine.
//!
//! Three linear steps: pick a date, pick a time, review the summary and
//! confirm. Picker values are provisional (`temp_*`) until "Next" commits
//! them, so going back never loses a selection.
//!
//! Validation is deferred: the date step accepts any date, including past
//! ones. Future-ness is checked when the time is committed and again on
//! confirm, against the wall clock at that moment.

use crate::clock::Clock;
use crate::models::{AppointmentType, BookingSubmission, Notice, WizardStage};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::sync::Arc;
use thiserror::Error;

/// Snap a time to the nearest half-hour slot.
///
/// Minutes below 15 round down to `:00`, 15 to 44 go to `:30`, 45 and above
/// roll to the next hour. `23:45` and later wrap to `00:00` without touching
/// the date. Seconds are dropped.
pub fn snap_to_half_hour(time: NaiveTime) -> NaiveTime {
    let (hour, minute) = match time.minute() {
        m if m < 15 => (time.hour(), 0),
        m if m < 45 => (time.hour(), 30),
        _ => ((time.hour() + 1) % 24, 0),
    };
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// True when `date` at `time` lies strictly after `now`
pub fn is_future(date: NaiveDate, time: NaiveTime, now: NaiveDateTime) -> bool {
    date.and_time(time) > now
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("Action not available in the {actual:?} step")]
    WrongStage { actual: WizardStage },

    #[error("Selected time {0} is not in the future")]
    PastTime(NaiveDateTime),

    #[error("No date and time committed")]
    MissingTime,
}

impl WizardError {
    pub fn notice(&self) -> Notice {
        match self {
            WizardError::PastTime(_) => {
                Notice::new("Invalid Time", "Please choose a time in the future.")
            }
            WizardError::WrongStage { .. } | WizardError::MissingTime => {
                Notice::new("Error", "Please pick a date and time first.")
            }
        }
    }
}

/// Selections made so far. Only committed values reach the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    pub appointment_type: AppointmentType,
    pub temp_date: NaiveDate,
    pub date: Option<NaiveDate>,
    pub temp_time: NaiveTime,
    pub time: Option<NaiveTime>,
    pub stage: WizardStage,
}

impl BookingDraft {
    /// Committed date and time, once both exist
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        Some(self.date?.and_time(self.time?))
    }
}

pub struct BookingWizard {
    draft: BookingDraft,
    clock: Arc<dyn Clock>,
}

impl BookingWizard {
    /// Open the wizard with both pickers preset to the current wall time
    pub fn new(appointment_type: AppointmentType, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_local();
        Self {
            draft: BookingDraft {
                appointment_type,
                temp_date: now.date(),
                date: None,
                temp_time: now.time(),
                time: None,
                stage: WizardStage::Date,
            },
            clock,
        }
    }

    pub fn stage(&self) -> WizardStage {
        self.draft.stage
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn pick_date(&mut self, date: NaiveDate) -> Result<(), WizardError> {
        self.expect_stage(WizardStage::Date)?;
        self.draft.temp_date = date;
        Ok(())
    }

    pub fn pick_time(&mut self, time: NaiveTime) -> Result<(), WizardError> {
        self.expect_stage(WizardStage::Time)?;
        self.draft.temp_time = time;
        Ok(())
    }

    /// Commit the current step and advance. On a past time the wizard stays put.
    pub fn next(&mut self) -> Result<WizardStage, WizardError> {
        match self.draft.stage {
            WizardStage::Date => {
                self.draft.date = Some(self.draft.temp_date);
                self.draft.stage = WizardStage::Time;
            }
            WizardStage::Time => {
                let date = self.draft.date.ok_or(WizardError::MissingTime)?;
                let snapped = snap_to_half_hour(self.draft.temp_time);
                if !is_future(date, snapped, self.clock.now_local()) {
                    tracing::debug!("Rejected past slot {} {}", date, snapped);
                    return Err(WizardError::PastTime(date.and_time(snapped)));
                }
                self.draft.time = Some(snapped);
                self.draft.stage = WizardStage::Summary;
            }
            actual @ WizardStage::Summary => return Err(WizardError::WrongStage { actual }),
        }
        Ok(self.draft.stage)
    }

    /// Step back one stage. `None` means the wizard was dismissed from the first step.
    pub fn back(&mut self) -> Option<WizardStage> {
        self.draft.stage = match self.draft.stage {
            WizardStage::Date => return None,
            WizardStage::Time => WizardStage::Date,
            WizardStage::Summary => WizardStage::Time,
        };
        Some(self.draft.stage)
    }

    /// Re-check the committed slot against the clock and build the submission
    pub fn confirm(&self, user_name: Option<&str>) -> Result<BookingSubmission, WizardError> {
        self.expect_stage(WizardStage::Summary)?;

        let (date, time) = match (self.draft.date, self.draft.time) {
            (Some(date), Some(time)) => (date, time),
            _ => return Err(WizardError::MissingTime),
        };

        if !is_future(date, time, self.clock.now_local()) {
            return Err(WizardError::PastTime(date.and_time(time)));
        }

        let submission =
            BookingSubmission::new(user_name, self.draft.appointment_type, date, time);

        tracing::info!(
            user = %submission.user,
            appointment_type = submission.appointment_type.label(),
            date = %submission.date,
            time = %submission.time,
            "Booking confirmed"
        );

        Ok(submission)
    }

    fn expect_stage(&self, stage: WizardStage) -> Result<(), WizardError> {
        if self.draft.stage == stage {
            Ok(())
        } else {
            Err(WizardError::WrongStage {
                actual: self.draft.stage,
            })
        }
    }
}
