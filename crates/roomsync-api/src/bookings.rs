// Booking endpoints

use chrono::NaiveDate;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{Availability, Booking, CreateBookingRequest, RoomPk};

const DATE_FORMAT: &str = "%Y-%m-%d";

impl ApiClient {
    /// Ask whether a room is free between two dates.
    ///
    /// `GET room/{pk}/booking/check?check_in=YYYY-MM-DD&check_out=YYYY-MM-DD`
    pub async fn check_booking(
        &self,
        pk: RoomPk,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Availability, Error> {
        let mut url = self.api_url(&format!("room/{pk}/booking/check"))?;
        url.query_pairs_mut()
            .append_pair("check_in", &check_in.format(DATE_FORMAT).to_string())
            .append_pair("check_out", &check_out.format(DATE_FORMAT).to_string());
        debug!(pk, %check_in, %check_out, "checking availability");
        self.get(url).await
    }

    /// Book a room.
    ///
    /// `POST room/{pk}/booking` (CSRF)
    pub async fn create_booking(
        &self,
        pk: RoomPk,
        body: &CreateBookingRequest,
    ) -> Result<Booking, Error> {
        let url = self.api_url(&format!("room/{pk}/booking"))?;
        self.post(url, body).await
    }
}
