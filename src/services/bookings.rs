//! Booking persistence and the calendar view.

use super::{AuthContext, ServiceError};
use crate::backend::{DataService, Filter, Order, Query, fetch_rows, tables};
use crate::models::{Booking, BookingSubmission};
use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use std::sync::Arc;

pub struct BookingService {
    auth: Arc<AuthContext>,
    data: Arc<dyn DataService>,
}

impl BookingService {
    pub fn new(auth: Arc<AuthContext>, data: Arc<dyn DataService>) -> Self {
        Self { auth, data }
    }

    /// Store a confirmed wizard submission for the caller
    pub async fn submit(&self, submission: &BookingSubmission) -> Result<(), ServiceError> {
        let user_id = self.auth.require_user_id()?;

        self.data
            .insert(tables::BOOKINGS, vec![submission.to_row(&user_id)])
            .await
            .map_err(ServiceError::backend("save booking"))?;

        tracing::info!(
            "Saved {} on {} at {}",
            submission.appointment_type.label(),
            submission.date,
            submission.time
        );
        Ok(())
    }

    /// The caller's bookings, most recently created first
    pub async fn my_bookings(&self) -> Result<Vec<Booking>, ServiceError> {
        let user_id = self.auth.require_user_id()?;

        let query = Query::table(tables::BOOKINGS)
            .eq("user_id", user_id)
            .order_by("created_at", Order::Desc);

        fetch_rows(self.data.as_ref(), &query)
            .await
            .map_err(ServiceError::backend("load bookings"))
    }

    pub async fn delete(&self, booking_id: &str) -> Result<(), ServiceError> {
        self.data
            .delete(tables::BOOKINGS, vec![Filter::eq("id", booking_id)])
            .await
            .map_err(ServiceError::backend("delete booking"))?;

        tracing::info!("Deleted booking {}", booking_id);
        Ok(())
    }

    /// Every booking visible to the caller, grouped by appointment date
    pub async fn calendar(&self) -> Result<BookingCalendar, ServiceError> {
        let query = Query::table(tables::BOOKINGS).order_by("appointment_date", Order::Asc);

        let bookings = fetch_rows(self.data.as_ref(), &query)
            .await
            .map_err(ServiceError::backend("load calendar"))?;

        Ok(BookingCalendar::from_bookings(bookings))
    }
}

/// Bookings keyed by `YYYY-MM-DD`, dates in ascending order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingCalendar {
    by_date: IndexMap<String, Vec<Booking>>,
}

impl BookingCalendar {
    pub fn from_bookings(bookings: Vec<Booking>) -> Self {
        let mut by_date: IndexMap<String, Vec<Booking>> = IndexMap::new();
        for booking in bookings {
            by_date
                .entry(booking.appointment_date.clone())
                .or_default()
                .push(booking);
        }
        by_date.sort_keys();
        Self { by_date }
    }

    /// Dates that carry at least one booking (calendar markers)
    pub fn marked_dates(&self) -> impl Iterator<Item = &str> {
        self.by_date.keys().map(String::as_str)
    }

    pub fn on(&self, date: NaiveDate) -> &[Booking] {
        self.by_date
            .get(&date.format("%Y-%m-%d").to_string())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

/// "5th March" style heading for a calendar day
pub fn format_date_label(date: NaiveDate) -> String {
    let day = date.day();
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{} {}", day, suffix, date.format("%B"))
}
