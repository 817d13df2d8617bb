//! Bulk row insertion
//!
//! Every table is loaded through multi-row `INSERT ... VALUES` statements
//! built with `QueryBuilder`. Rows are chunked so a single statement never
//! binds more parameters than SQLite accepts.

use crate::error::Result;
use sqlx::query_builder::Separated;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashSet;

/// Upper bound on bound parameters per statement (SQLite >= 3.32)
pub const SQLITE_MAX_VARIABLES: usize = 32_766;

/// A row that knows which table and columns it belongs to
pub trait TableRow {
    /// Destination table
    const TABLE: &'static str;

    /// Destination columns, in bind order
    const COLUMNS: &'static [&'static str];

    /// Insert verb; natural-key tables override this with `INSERT OR IGNORE`
    const INSERT: &'static str = "INSERT";

    /// Bind one value per entry of `COLUMNS`, in the same order
    fn bind_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>);
}

impl<R: TableRow> TableRow for &R {
    const TABLE: &'static str = R::TABLE;
    const COLUMNS: &'static [&'static str] = R::COLUMNS;
    const INSERT: &'static str = R::INSERT;

    fn bind_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
        (**self).bind_columns(row)
    }
}

/// A row owned by a parent row (route points, ECG samples)
pub trait ChildRow: TableRow {
    fn parent_id(&self) -> i64;
}

/// Largest number of rows of `R` that fit in one statement
pub fn rows_per_statement<R: TableRow>() -> usize {
    (SQLITE_MAX_VARIABLES / R::COLUMNS.len().max(1)).max(1)
}

/// Start an insert statement for `R` up to (and including) `VALUES`
pub fn insert_builder<'args, R: TableRow>() -> QueryBuilder<'args, Sqlite> {
    QueryBuilder::new(format!(
        "{} INTO {} ({}) ",
        R::INSERT,
        R::TABLE,
        R::COLUMNS.join(", ")
    ))
}

/// Insert all rows, returning the number of rows the store reports as written
pub async fn insert_rows<R: TableRow>(conn: &mut SqliteConnection, rows: &[R]) -> Result<u64> {
    let mut written = 0;

    for chunk in rows.chunks(rows_per_statement::<R>()) {
        let mut query_builder = insert_builder::<R>();
        query_builder.push_values(chunk, |mut b, row| row.bind_columns(&mut b));

        written += query_builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(written)
}

/// Insert rows and return the `id` of each row actually written
///
/// With an `INSERT OR IGNORE` table, rows rejected by a uniqueness
/// constraint are absent from the result.
pub async fn insert_returning_ids<R: TableRow>(
    conn: &mut SqliteConnection,
    rows: &[R],
) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(rows.len());

    for chunk in rows.chunks(rows_per_statement::<R>()) {
        let mut query_builder = insert_builder::<R>();
        query_builder.push_values(chunk, |mut b, row| row.bind_columns(&mut b));
        query_builder.push(" RETURNING id");

        ids.extend(
            query_builder
                .build_query_scalar::<i64>()
                .fetch_all(&mut *conn)
                .await?,
        );
    }

    Ok(ids)
}

/// Insert parents, then only the children whose parent was written
///
/// Returns the ids of the parents written. Children of an ignored parent are
/// dropped so no orphan rows reach the store.
pub async fn insert_with_children<P: TableRow, C: ChildRow>(
    conn: &mut SqliteConnection,
    parents: &[P],
    children: &[C],
) -> Result<HashSet<i64>> {
    let written: HashSet<i64> = insert_returning_ids(conn, parents).await?.into_iter().collect();

    if written.len() == parents.len() {
        insert_rows(conn, children).await?;
    } else {
        let kept: Vec<&C> = children
            .iter()
            .filter(|child| written.contains(&child.parent_id()))
            .collect();
        insert_rows(conn, kept.as_slice()).await?;
    }

    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct Pair {
        n: i64,
        label: Option<String>,
    }

    impl TableRow for Pair {
        const TABLE: &'static str = "pairs";
        const COLUMNS: &'static [&'static str] = &["n", "label"];

        fn bind_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
            row.push_bind(self.n).push_bind(self.label.clone());
        }
    }

    #[test]
    fn test_rows_per_statement_respects_limit() {
        assert_eq!(rows_per_statement::<Pair>(), SQLITE_MAX_VARIABLES / 2);
    }

    #[test]
    fn test_insert_builder_prefix() {
        let query_builder = insert_builder::<Pair>();
        assert_eq!(query_builder.sql(), "INSERT INTO pairs (n, label) ");
    }

    #[tokio::test]
    async fn test_insert_rows_spans_statements() {
        use sqlx::Connection;

        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        sqlx::query("CREATE TABLE pairs (n INTEGER, label TEXT)")
            .execute(&mut conn)
            .await
            .unwrap();

        let rows: Vec<Pair> = (0..(rows_per_statement::<Pair>() as i64 + 10))
            .map(|i| Pair {
                n: i,
                label: (i % 2 == 0).then(|| format!("row-{i}")),
            })
            .collect();

        let written = insert_rows(&mut conn, &rows).await.unwrap();
        assert_eq!(written, rows.len() as u64);

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pairs")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(stored, rows.len() as i64);
    }

    struct Parent {
        id: i64,
        key: &'static str,
    }

    impl TableRow for Parent {
        const TABLE: &'static str = "parents";
        const COLUMNS: &'static [&'static str] = &["id", "key"];
        const INSERT: &'static str = "INSERT OR IGNORE";

        fn bind_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
            row.push_bind(self.id).push_bind(self.key.to_string());
        }
    }

    struct Child {
        parent: i64,
        n: i64,
    }

    impl TableRow for Child {
        const TABLE: &'static str = "children";
        const COLUMNS: &'static [&'static str] = &["parent", "n"];

        fn bind_columns(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
            row.push_bind(self.parent).push_bind(self.n);
        }
    }

    impl ChildRow for Child {
        fn parent_id(&self) -> i64 {
            self.parent
        }
    }

    #[tokio::test]
    async fn test_children_of_ignored_parents_are_dropped() {
        use sqlx::Connection;

        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        for ddl in [
            "CREATE TABLE parents (id INTEGER PRIMARY KEY, key TEXT UNIQUE)",
            "CREATE TABLE children (parent INTEGER, n INTEGER)",
        ] {
            sqlx::query(ddl).execute(&mut conn).await.unwrap();
        }

        let first = insert_with_children(
            &mut conn,
            &[Parent { id: 1, key: "a" }],
            &[Child { parent: 1, n: 0 }],
        )
        .await
        .unwrap();
        assert_eq!(first, HashSet::from([1]));

        let second = insert_with_children(
            &mut conn,
            &[Parent { id: 2, key: "a" }, Parent { id: 3, key: "b" }],
            &[Child { parent: 2, n: 0 }, Child { parent: 3, n: 0 }, Child { parent: 3, n: 1 }],
        )
        .await
        .unwrap();
        assert_eq!(second, HashSet::from([3]));

        let orphans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM children WHERE parent NOT IN (SELECT id FROM parents)",
        )
        .fetch_one(&mut conn)
        .await
        .unwrap();
        assert_eq!(orphans, 0);

        let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM children")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(children, 3);
    }
}
