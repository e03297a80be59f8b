use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use super::{
    FilmStore, HallStore, ScreeningStore, SeatInventory, SlotClaim, StoreError, StoreResult,
    TicketStore, UserStore,
};
use crate::models::{
    Film, FilmFilter, Hall, HallSeat, NewFilm, NewUser, Screening, ScreeningDraft,
    ScreeningSummary, SeatLayout, SeatSlot, Ticket, TicketStatus, TicketView, User,
};

const SLOT_COLUMNS: &str = r#"ss.id, ss.screening_id, ss.seat_id, hs.row_number AS "row", hs.number, ss.free, ss.version"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unique_or_db(err: sqlx::Error, what: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(what),
        _ => StoreError::Database(err),
    }
}

// Conditional write: only succeeds if the row still has the version the caller read.
async fn claim_on(conn: &mut PgConnection, slot_id: i64, expected_version: i32) -> StoreResult<SeatSlot> {
    let claimed = sqlx::query_as::<_, SeatSlot>(&format!(
        r#"
        WITH ss AS (
            UPDATE seat_slots
            SET free = FALSE, version = version + 1
            WHERE id = $1 AND version = $2 AND free = TRUE
            RETURNING id, screening_id, seat_id, free, version
        )
        SELECT {SLOT_COLUMNS}
        FROM ss
        JOIN hall_seats hs ON hs.id = ss.seat_id
        "#
    ))
    .bind(slot_id)
    .bind(expected_version)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(slot) = claimed {
        return Ok(slot);
    }

    // Nothing matched; find out why.
    let current: Option<(bool, i32)> =
        sqlx::query_as("SELECT free, version FROM seat_slots WHERE id = $1")
            .bind(slot_id)
            .fetch_optional(&mut *conn)
            .await?;

    match current {
        None => Err(StoreError::SlotNotFound(slot_id)),
        Some((false, _)) => Err(StoreError::SlotTaken(slot_id)),
        Some((true, version)) => {
            debug!(slot_id, expected_version, version, "seat slot version moved");
            Err(StoreError::VersionConflict {
                slot_id,
                expected: expected_version,
            })
        }
    }
}

async fn release_on(conn: &mut PgConnection, slot_id: i64) -> StoreResult<SeatSlot> {
    sqlx::query_as::<_, SeatSlot>(&format!(
        r#"
        WITH ss AS (
            UPDATE seat_slots
            SET free = TRUE, version = version + 1
            WHERE id = $1
            RETURNING id, screening_id, seat_id, free, version
        )
        SELECT {SLOT_COLUMNS}
        FROM ss
        JOIN hall_seats hs ON hs.id = ss.seat_id
        "#
    ))
    .bind(slot_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(StoreError::SlotNotFound(slot_id))
}

async fn hall_seats(pool: &PgPool, hall_id: i64) -> StoreResult<Vec<HallSeat>> {
    let seats = sqlx::query_as::<_, HallSeat>(
        r#"
        SELECT id, row_number AS "row", number
        FROM hall_seats
        WHERE hall_id = $1
        ORDER BY row_number, number
        "#,
    )
    .bind(hall_id)
    .fetch_all(pool)
    .await?;
    Ok(seats)
}

#[async_trait]
impl FilmStore for PgStore {
    async fn add_film(&self, film: NewFilm) -> StoreResult<Film> {
        sqlx::query_as::<_, Film>(
            "INSERT INTO films (title, category, year, duration_in_minutes)
             VALUES ($1, $2, $3, $4)
             RETURNING id, title, category, year, duration_in_minutes",
        )
        .bind(&film.title)
        .bind(film.category)
        .bind(film.year)
        .bind(film.duration_in_minutes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_or_db(e, "film title"))
    }

    async fn film_by_id(&self, id: i64) -> StoreResult<Option<Film>> {
        let film = sqlx::query_as::<_, Film>(
            "SELECT id, title, category, year, duration_in_minutes FROM films WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(film)
    }

    async fn list_films(&self, filter: &FilmFilter) -> StoreResult<Vec<Film>> {
        let films = sqlx::query_as::<_, Film>(
            r#"
            SELECT id, title, category, year, duration_in_minutes
            FROM films
            WHERE ($1::TEXT IS NULL OR title ILIKE '%' || $1 || '%')
              AND ($2::film_category IS NULL OR category = $2)
            ORDER BY title
            "#,
        )
        .bind(filter.title.as_deref())
        .bind(filter.category)
        .fetch_all(&self.pool)
        .await?;
        Ok(films)
    }

    async fn delete_film_by_title(&self, title: &str) -> StoreResult<Option<Vec<i64>>> {
        let mut tx = self.pool.begin().await?;

        // Row lock keeps new screenings from referencing the film until commit.
        let film_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM films WHERE title = $1 FOR UPDATE")
                .bind(title)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(film_id) = film_id else {
            tx.rollback().await?;
            return Ok(None);
        };

        let screenings: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM screenings WHERE film_id = $1 ORDER BY id")
                .bind(film_id)
                .fetch_all(&mut *tx)
                .await?;
        sqlx::query("DELETE FROM films WHERE id = $1")
            .bind(film_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(screenings))
    }
}

#[async_trait]
impl HallStore for PgStore {
    async fn add_hall(&self, layout: &SeatLayout) -> StoreResult<Hall> {
        let (rows, numbers): (Vec<i32>, Vec<i32>) = layout
            .positions()
            .iter()
            .map(|position| (position.row, position.number))
            .unzip();

        let mut tx = self.pool.begin().await?;

        let hall_id: i64 = sqlx::query_scalar("INSERT INTO halls DEFAULT VALUES RETURNING id")
            .fetch_one(&mut *tx)
            .await?;

        let mut seats = sqlx::query_as::<_, HallSeat>(
            r#"
            INSERT INTO hall_seats (hall_id, row_number, number)
            SELECT $1, r, n FROM UNNEST($2::INT[], $3::INT[]) AS t(r, n)
            RETURNING id, row_number AS "row", number
            "#,
        )
        .bind(hall_id)
        .bind(&rows)
        .bind(&numbers)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| unique_or_db(e, "hall seat"))?;

        tx.commit().await?;

        seats.sort_by_key(|seat| (seat.row, seat.number));
        Ok(Hall { id: hall_id, seats })
    }

    async fn hall_by_id(&self, id: i64) -> StoreResult<Option<Hall>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM halls WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Ok(None);
        }
        let seats = hall_seats(&self.pool, id).await?;
        Ok(Some(Hall { id, seats }))
    }

    async fn list_halls(&self) -> StoreResult<Vec<Hall>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM halls ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let rows: Vec<(i64, i64, i32, i32)> = sqlx::query_as(
            "SELECT hall_id, id, row_number, number
             FROM hall_seats
             ORDER BY hall_id, row_number, number",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_hall: BTreeMap<i64, Vec<HallSeat>> =
            ids.into_iter().map(|id| (id, Vec::new())).collect();
        for (hall_id, id, row, number) in rows {
            if let Some(seats) = by_hall.get_mut(&hall_id) {
                seats.push(HallSeat { id, row, number });
            }
        }
        Ok(by_hall
            .into_iter()
            .map(|(id, seats)| Hall { id, seats })
            .collect())
    }

    async fn delete_hall(&self, id: i64) -> StoreResult<Option<Vec<i64>>> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM halls WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let screenings: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM screenings WHERE hall_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        sqlx::query("DELETE FROM halls WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(screenings))
    }
}

#[async_trait]
impl ScreeningStore for PgStore {
    async fn insert_screening(&self, draft: ScreeningDraft) -> StoreResult<Screening> {
        let mut tx = self.pool.begin().await?;

        // Serializes overlap check + insert for this hall until commit/rollback.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(draft.hall_id)
            .execute(&mut *tx)
            .await?;

        // Shared lock holds off a concurrent hall delete until commit.
        let hall: Option<i64> = sqlx::query_scalar("SELECT id FROM halls WHERE id = $1 FOR SHARE")
            .bind(draft.hall_id)
            .fetch_optional(&mut *tx)
            .await?;
        if hall.is_none() {
            tx.rollback().await?;
            return Err(StoreError::HallMissing(draft.hall_id));
        }

        let collides: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM screenings
                WHERE hall_id = $1 AND start_time < $3 AND $2 < end_time
            )
            "#,
        )
        .bind(draft.hall_id)
        .bind(draft.window.start)
        .bind(draft.window.end)
        .fetch_one(&mut *tx)
        .await?;

        if collides {
            tx.rollback().await?;
            return Err(StoreError::HallOverlap(draft.hall_id));
        }

        let screening = sqlx::query_as::<_, Screening>(
            "INSERT INTO screenings (start_time, end_time, film_id, hall_id)
             VALUES ($1, $2, $3, $4)
             RETURNING id, start_time, end_time, film_id, hall_id",
        )
        .bind(draft.window.start)
        .bind(draft.window.end)
        .bind(draft.film_id)
        .bind(draft.hall_id)
        .fetch_one(&mut *tx)
        .await?;

        let seeded = sqlx::query(
            "INSERT INTO seat_slots (screening_id, seat_id, free, version)
             SELECT $1, id, TRUE, 0 FROM hall_seats WHERE hall_id = $2
             ORDER BY row_number, number",
        )
        .bind(screening.id)
        .bind(draft.hall_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            screening_id = screening.id,
            slots = seeded.rows_affected(),
            "screening inserted"
        );
        Ok(screening)
    }

    async fn screening_by_id(&self, id: i64) -> StoreResult<Option<Screening>> {
        let screening = sqlx::query_as::<_, Screening>(
            "SELECT id, start_time, end_time, film_id, hall_id FROM screenings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(screening)
    }

    async fn list_screenings(&self, date: Option<NaiveDate>) -> StoreResult<Vec<ScreeningSummary>> {
        let screenings = sqlx::query_as::<_, ScreeningSummary>(
            r#"
            SELECT s.id, s.start_time, s.end_time, s.film_id, f.title AS film_title, s.hall_id
            FROM screenings s
            JOIN films f ON f.id = s.film_id
            WHERE ($1::DATE IS NULL OR s.start_time::DATE = $1)
            ORDER BY s.start_time, s.id
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(screenings)
    }

    async fn delete_screening(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM screenings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SeatInventory for PgStore {
    async fn slots_for_screening(&self, screening_id: i64) -> StoreResult<Vec<SeatSlot>> {
        let slots = sqlx::query_as::<_, SeatSlot>(&format!(
            r#"
            SELECT {SLOT_COLUMNS}
            FROM seat_slots ss
            JOIN hall_seats hs ON hs.id = ss.seat_id
            WHERE ss.screening_id = $1
            ORDER BY hs.row_number, hs.number
            "#
        ))
        .bind(screening_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(slots)
    }

    async fn slot_by_id(&self, slot_id: i64) -> StoreResult<Option<SeatSlot>> {
        let slot = sqlx::query_as::<_, SeatSlot>(&format!(
            r#"
            SELECT {SLOT_COLUMNS}
            FROM seat_slots ss
            JOIN hall_seats hs ON hs.id = ss.seat_id
            WHERE ss.id = $1
            "#
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(slot)
    }

    async fn claim(&self, slot_id: i64, expected_version: i32) -> StoreResult<SeatSlot> {
        let mut conn = self.pool.acquire().await?;
        claim_on(&mut conn, slot_id, expected_version).await
    }

    async fn release(&self, slot_id: i64) -> StoreResult<SeatSlot> {
        let mut conn = self.pool.acquire().await?;
        release_on(&mut conn, slot_id).await
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn book_slots(&self, user_id: i64, claims: &[SlotClaim]) -> StoreResult<Vec<Ticket>> {
        let mut tx = self.pool.begin().await?;

        // An early return drops `tx`, which rolls every claim back.
        for claim in claims {
            claim_on(&mut tx, claim.slot_id, claim.expected_version).await?;
        }

        let mut tickets = Vec::with_capacity(claims.len());
        for claim in claims {
            let ticket = sqlx::query_as::<_, Ticket>(
                "INSERT INTO tickets (status, slot_id, user_id)
                 VALUES ($1, $2, $3)
                 RETURNING id, status, slot_id, user_id",
            )
            .bind(TicketStatus::Booked)
            .bind(claim.slot_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
            tickets.push(ticket);
        }

        tx.commit().await?;
        Ok(tickets)
    }

    async fn ticket_for_user(&self, ticket_id: i64, user_id: i64) -> StoreResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "SELECT id, status, slot_id, user_id FROM tickets WHERE id = $1 AND user_id = $2",
        )
        .bind(ticket_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn cancel_ticket(&self, ticket_id: i64) -> StoreResult<Ticket> {
        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET status = $2
             WHERE id = $1 AND status = $3
             RETURNING id, status, slot_id, user_id",
        )
        .bind(ticket_id)
        .bind(TicketStatus::Cancelled)
        .bind(TicketStatus::Booked)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::TicketNotBooked(ticket_id))?;

        release_on(&mut tx, ticket.slot_id).await?;

        tx.commit().await?;
        Ok(ticket)
    }

    async fn tickets_for_user(&self, user_id: i64) -> StoreResult<Vec<TicketView>> {
        let tickets = sqlx::query_as::<_, TicketView>(
            r#"
            SELECT t.id, t.status, s.id AS screening_id, f.title AS film_title,
                   s.start_time, s.hall_id, hs.row_number AS "row", hs.number
            FROM tickets t
            JOIN seat_slots ss ON ss.id = t.slot_id
            JOIN screenings s ON s.id = ss.screening_id
            JOIN films f ON f.id = s.film_id
            JOIN hall_seats hs ON hs.id = ss.seat_id
            WHERE t.user_id = $1
            ORDER BY t.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn add_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (mail, password_hash, role)
             VALUES ($1, $2, $3)
             RETURNING id, mail, password_hash, role, password_reset_token",
        )
        .bind(&user.mail)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_or_db(e, "user mail"))
    }

    async fn user_by_mail(&self, mail: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, mail, password_hash, role, password_reset_token FROM users WHERE mail = $1",
        )
        .bind(mail)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_reset_token(&self, token: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, mail, password_hash, role, password_reset_token
             FROM users WHERE password_reset_token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_reset_token(&self, user_id: i64, token: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE users SET password_reset_token = $2 WHERE id = $1")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, password_reset_token = NULL WHERE id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
