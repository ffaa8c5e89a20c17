use crate::models::{Product, Profile};
use anyhow::{Context, Result};
use chrono::Utc;
use duckdb::{Connection, params};
use std::path::Path;
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS profile_id_seq;
CREATE SEQUENCE IF NOT EXISTS product_id_seq;
CREATE SEQUENCE IF NOT EXISTS store_id_seq;
CREATE SEQUENCE IF NOT EXISTS feedback_id_seq;
CREATE SEQUENCE IF NOT EXISTS run_id_seq;

CREATE TABLE IF NOT EXISTS profile (
    id          INTEGER PRIMARY KEY DEFAULT nextval('profile_id_seq'),
    name        VARCHAR NOT NULL,
    surname     VARCHAR NOT NULL,
    email       VARCHAR NOT NULL,
    city        VARCHAR NOT NULL,
    scraped_at  TIMESTAMP NOT NULL
);

-- Append-only: no uniqueness on title, re-runs add new rows.
CREATE TABLE IF NOT EXISTS product (
    id           INTEGER PRIMARY KEY DEFAULT nextval('product_id_seq'),
    title        VARCHAR NOT NULL,
    price_opt    VARCHAR NOT NULL,
    price_roz    VARCHAR NOT NULL,
    feedback_num VARCHAR NOT NULL,
    scraped_at   TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS store (
    id          INTEGER PRIMARY KEY DEFAULT nextval('store_id_seq'),
    store       VARCHAR NOT NULL,
    product_id  INTEGER NOT NULL REFERENCES product (id)
);

CREATE TABLE IF NOT EXISTS feedback (
    id          INTEGER PRIMARY KEY DEFAULT nextval('feedback_id_seq'),
    post        VARCHAR NOT NULL,
    product_id  INTEGER NOT NULL REFERENCES product (id)
);

CREATE TABLE IF NOT EXISTS scrape_runs (
    id               INTEGER PRIMARY KEY DEFAULT nextval('run_id_seq'),
    started_at       TIMESTAMP NOT NULL,
    finished_at      TIMESTAMP,
    status           VARCHAR NOT NULL DEFAULT 'running',
    products_saved   INTEGER DEFAULT 0,
    rows_inserted    INTEGER DEFAULT 0,
    error_msg        VARCHAR
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_store_product    ON store (product_id);
CREATE INDEX IF NOT EXISTS idx_feedback_product ON feedback (product_id);
CREATE INDEX IF NOT EXISTS idx_product_title    ON product (title);
"#;

// ── Repository ────────────────────────────────────────────────────────────────

/// A stored product row, as listed by the CLI.
#[derive(Debug, Clone)]
pub struct StoredProduct {
    pub id: i64,
    pub title: String,
    pub feedback_num: String,
}

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn
            .execute_batch(INDEXES)
            .context("Index creation failed")?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Profile ───────────────────────────────────────────────────────────────

    /// Insert one profile row, returning its id.
    pub fn insert_profile(&self, profile: &Profile) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let id: i64 = tx
            .query_row(
                r#"INSERT INTO profile (name, surname, email, city, scraped_at)
                   VALUES (?, ?, ?, ?, ?)
                   RETURNING id"#,
                params![
                    profile.first_name,
                    profile.surname,
                    profile.email,
                    profile.city,
                    profile.scraped_at,
                ],
                |r| r.get(0),
            )
            .with_context(|| format!("insert profile {}", profile.email))?;
        tx.commit()?;
        Ok(id)
    }

    pub fn profiles(&self) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, surname, email, city, scraped_at FROM profile ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Profile {
                    first_name: r.get(0)?,
                    surname: r.get(1)?,
                    email: r.get(2)?,
                    city: r.get(3)?,
                    scraped_at: r.get(4)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ── Products ──────────────────────────────────────────────────────────────

    /// Insert a product with its store and feedback rows in one
    /// transaction. The product id comes straight from the insert, so
    /// identical titles never cross-link child rows.
    pub fn insert_product(&self, product: &Product) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        let product_id: i64 = tx
            .query_row(
                r#"INSERT INTO product (title, price_opt, price_roz, feedback_num, scraped_at)
                   VALUES (?, ?, ?, ?, ?)
                   RETURNING id"#,
                params![
                    product.title,
                    product.wholesale_price,
                    product.retail_price,
                    product.feedback_count,
                    product.scraped_at,
                ],
                |r| r.get(0),
            )
            .with_context(|| format!("insert product {}", product.title))?;

        for store in &product.stores {
            tx.execute(
                "INSERT INTO store (store, product_id) VALUES (?, ?)",
                params![store, product_id],
            )
            .with_context(|| format!("insert store row for {}", product.title))?;
        }

        for post in &product.posts {
            tx.execute(
                "INSERT INTO feedback (post, product_id) VALUES (?, ?)",
                params![post, product_id],
            )
            .with_context(|| format!("insert feedback row for {}", product.title))?;
        }

        tx.commit()?;
        Ok(product_id)
    }

    pub fn list_products(&self) -> Result<Vec<StoredProduct>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, feedback_num FROM product ORDER BY id")?;
        let rows = stmt
            .query_map([], |r| {
                Ok(StoredProduct {
                    id: r.get(0)?,
                    title: r.get(1)?,
                    feedback_num: r.get(2)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn stores_for_product(&self, product_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT store FROM store WHERE product_id = ? ORDER BY id")?;
        let rows = stmt
            .query_map(params![product_id], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn posts_for_product(&self, product_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT post FROM feedback WHERE product_id = ? ORDER BY id")?;
        let rows = stmt
            .query_map(params![product_id], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ── Counts ────────────────────────────────────────────────────────────────

    pub fn profile_count(&self) -> Result<i64> {
        self.count("profile")
    }

    pub fn product_count(&self) -> Result<i64> {
        self.count("product")
    }

    pub fn store_count(&self) -> Result<i64> {
        self.count("store")
    }

    pub fn feedback_count(&self) -> Result<i64> {
        self.count("feedback")
    }

    fn count(&self, table: &str) -> Result<i64> {
        let mut s = self
            .conn
            .prepare(&format!("SELECT COUNT(*) FROM {}", table))?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    // ── Scrape run log ────────────────────────────────────────────────────────

    pub fn begin_scrape_run(&self) -> Result<i64> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO scrape_runs (started_at, status) VALUES (?, 'running') RETURNING id",
            params![Utc::now().naive_utc()],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn finish_scrape_run(
        &self,
        run_id: i64,
        products: usize,
        rows: usize,
        error: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            r#"UPDATE scrape_runs SET
               finished_at = ?, status = ?,
               products_saved = ?, rows_inserted = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if error.is_none() { "success" } else { "error" },
                products as i64,
                rows as i64,
                error,
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn last_run(&self) -> Result<Option<(chrono::NaiveDateTime, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT started_at, status FROM scrape_runs ORDER BY started_at DESC LIMIT 1",
        )?;
        match stmt.query_row([], |r| Ok((r.get(0)?, r.get(1)?))) {
            Ok(row) => Ok(Some(row)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn repo() -> Repository {
        let r = Repository::open_in_memory().unwrap();
        r.run_migrations().unwrap();
        r
    }

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    fn profile() -> Profile {
        Profile {
            first_name: "Иван".into(),
            surname: "Петров".into(),
            email: "ivan@example.com".into(),
            city: "Москва".into(),
            scraped_at: now(),
        }
    }

    fn product(title: &str, stores: &[&str], posts: &[&str]) -> Product {
        Product {
            title: title.into(),
            wholesale_price: "1500 ₽".into(),
            retail_price: "1700 ₽".into(),
            feedback_count: "3".into(),
            stores: stores.iter().map(|s| s.to_string()).collect(),
            posts: posts.iter().map(|s| s.to_string()).collect(),
            scraped_at: now(),
        }
    }

    #[test]
    fn profile_round_trips_as_one_row() {
        let repo = repo();
        repo.insert_profile(&profile()).unwrap();

        let rows = repo.profiles().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_name, "Иван");
        assert_eq!(rows[0].surname, "Петров");
        assert_eq!(rows[0].email, "ivan@example.com");
        assert_eq!(rows[0].city, "Москва");
    }

    #[test]
    fn product_children_link_to_their_parent() {
        let repo = repo();
        let a = repo
            .insert_product(&product("Облучатель", &["г. Москва"], &["Хорошо"]))
            .unwrap();
        let b = repo
            .insert_product(&product("Ингалятор", &["г. Тверь", "г. Казань"], &[]))
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(repo.product_count().unwrap(), 2);
        assert_eq!(repo.stores_for_product(a).unwrap(), vec!["г. Москва"]);
        assert_eq!(
            repo.stores_for_product(b).unwrap(),
            vec!["г. Тверь", "г. Казань"]
        );
        assert_eq!(repo.posts_for_product(a).unwrap(), vec!["Хорошо"]);
        assert!(repo.posts_for_product(b).unwrap().is_empty());
    }

    #[test]
    fn identical_titles_get_distinct_ids_and_correct_children() {
        let repo = repo();
        let first = repo
            .insert_product(&product("Облучатель", &["г. Москва"], &[]))
            .unwrap();
        let second = repo
            .insert_product(&product("Облучатель", &["г. Казань"], &["Пост"]))
            .unwrap();

        // The id is threaded from the insert itself, so a duplicate title
        // cannot cross-link child rows.
        assert_ne!(first, second);
        assert_eq!(repo.stores_for_product(first).unwrap(), vec!["г. Москва"]);
        assert_eq!(repo.stores_for_product(second).unwrap(), vec!["г. Казань"]);
        assert!(repo.posts_for_product(first).unwrap().is_empty());
        assert_eq!(repo.posts_for_product(second).unwrap(), vec!["Пост"]);
    }

    #[test]
    fn rerun_appends_duplicate_rows() {
        let repo = repo();
        let p = product("Облучатель", &["г. Москва"], &["Пост"]);
        repo.insert_product(&p).unwrap();
        repo.insert_product(&p).unwrap();

        // Append-only store: no dedup on re-runs.
        assert_eq!(repo.product_count().unwrap(), 2);
        assert_eq!(repo.store_count().unwrap(), 2);
        assert_eq!(repo.feedback_count().unwrap(), 2);
    }

    #[test]
    fn scrape_run_log_records_outcome() {
        let repo = repo();
        let run = repo.begin_scrape_run().unwrap();
        repo.finish_scrape_run(run, 3, 11, None).unwrap();

        let (_started, status) = repo.last_run().unwrap().unwrap();
        assert_eq!(status, "success");
    }

    #[test]
    fn empty_db_has_no_runs() {
        let repo = repo();
        assert!(repo.last_run().unwrap().is_none());
        assert_eq!(repo.profile_count().unwrap(), 0);
    }
}
