//! Data skew across segments, for every database.
//!
//! Installs `public.fn_get_skew()` in each database, then reads back
//! tables larger than 1 GB whose largest and smallest segment differ by
//! more than 20%. Segment file sizes come from a temporary external web
//! table that the function creates and drops.

use async_trait::async_trait;
use tracing::debug;

use super::{PerDatabase, query_into_sink, scrape_each_database};
use crate::adapters::postgres::connector::PgSession;
use crate::domain::{MetricDesc, SampleSink, ServerVersion};
use crate::error::CollectorError;
use crate::ports::Collector;

/// Configuration name and log identity.
pub const NAME: &str = "data_skew";

static DATA_SKEW_DETAIL: MetricDesc = MetricDesc::gauge(
    "greenplum_server_data_skew_detail",
    "Tables > 20% data skew across segments",
    &[
        "datname",
        "schema_name",
        "table_name",
        "total_size_gb",
        "seg_min_size_gb",
        "seg_max_size_gb",
        "seg_avg_size_gb",
        "seg_gap_min_max_percent",
        "seg_gap_min_max_gb",
        "nb_empty_seg",
    ],
);

const CREATE_SKEW_FN_SQL: &str = r#"
CREATE OR REPLACE FUNCTION public.fn_get_skew(
    out schema_name varchar,
    out table_name varchar,
    out total_size_GB numeric(15,2),
    out seg_min_size_GB numeric(15,2),
    out seg_max_size_GB numeric(15,2),
    out seg_avg_size_GB numeric(15,2),
    out seg_gap_min_max_percent numeric(6,2),
    out seg_gap_min_max_GB numeric(15,2),
    out nb_empty_seg int) RETURNS SETOF record AS
$$
DECLARE
    v_function_name text := 'fn_get_skew';
    v_location int;
    v_sql text;
    v_db_oid text;
    v_res record;
BEGIN
    v_location := 1000;
    SELECT oid INTO v_db_oid FROM pg_database WHERE datname = current_database();

    v_location := 2000;
    EXECUTE 'DROP EXTERNAL TABLE IF EXISTS public.db_files_ext';

    v_location := 3000;
    v_sql := 'CREATE EXTERNAL WEB TABLE public.db_files_ext ' ||
        '(segment_id int, relfilenode text, filename text, size numeric) ' ||
        'execute E''ls -l $GP_SEG_DATADIR/base/' || v_db_oid || ' | ' ||
        'grep gpadmin | ' ||
        E'awk {''''print ENVIRON["GP_SEGMENT_ID"] "\\t" $9 "\\t" ' ||
        'ENVIRON["GP_SEG_DATADIR"] "/' || v_db_oid ||
        E'/" $9 "\\t" $5''''}'' on all ' || 'format ''text''';
    EXECUTE v_sql;

    v_location := 4000;
    FOR v_res IN (
        SELECT sub.vschema_name,
               sub.vtable_name,
               (sum(sub.size)/(1024^3))::numeric(15,2) AS vtotal_size_GB,
               (min(sub.size)/(1024^3))::numeric(15,2) AS vseg_min_size_GB,
               (max(sub.size)/(1024^3))::numeric(15,2) AS vseg_max_size_GB,
               (avg(sub.size)/(1024^3))::numeric(15,2) AS vseg_avg_size_GB,
               (100*(max(sub.size) - min(sub.size))/greatest(max(sub.size),1))::numeric(6,2) AS vseg_gap_min_max_percent,
               ((max(sub.size) - min(sub.size))/(1024^3))::numeric(15,2) AS vseg_gap_min_max_GB,
               count(sub.size) FILTER (WHERE sub.size = 0) AS vnb_empty_seg
        FROM (
            SELECT n.nspname AS vschema_name,
                   c.relname AS vtable_name,
                   db.segment_id,
                   sum(db.size) AS size
            FROM ONLY public.db_files_ext db
            JOIN pg_class c ON split_part(db.relfilenode, '.'::text, 1) = c.relfilenode::text
            JOIN pg_namespace n ON c.relnamespace = n.oid
            WHERE c.relkind = 'r'::"char"
              AND n.nspname NOT IN ('pg_catalog', 'information_schema', 'gp_toolkit')
              AND NOT n.nspname LIKE 'pg_temp%'
            GROUP BY n.nspname, c.relname, db.segment_id
        ) sub
        GROUP BY 1, 2
        HAVING sum(sub.size)/(1024^3) > 1
           AND (100*(max(sub.size) - min(sub.size))/greatest(max(sub.size),1))::numeric(6,2) > 20
        ORDER BY vtotal_size_GB DESC, vseg_gap_min_max_percent DESC
        LIMIT 100
    ) LOOP
        schema_name := v_res.vschema_name;
        table_name := v_res.vtable_name;
        total_size_GB := v_res.vtotal_size_GB;
        seg_min_size_GB := v_res.vseg_min_size_GB;
        seg_max_size_GB := v_res.vseg_max_size_GB;
        seg_avg_size_GB := v_res.vseg_avg_size_GB;
        seg_gap_min_max_percent := v_res.vseg_gap_min_max_percent;
        seg_gap_min_max_GB := v_res.vseg_gap_min_max_GB;
        nb_empty_seg := v_res.vnb_empty_seg;
        RETURN NEXT;
    END LOOP;

    v_location := 5000;
    EXECUTE 'DROP EXTERNAL TABLE IF EXISTS public.db_files_ext';
    RETURN;
EXCEPTION
    WHEN OTHERS THEN
        RAISE EXCEPTION '(%:%:%)', v_function_name, v_location, sqlerrm;
END;
$$
LANGUAGE plpgsql"#;

const QUIET_NOTICES_SQL: &str = "SET client_min_messages TO WARNING";

const GET_SKEW_SQL: &str = r#"
    select extract(epoch from now())::float8 as value,
           current_database()::text as datname,
           schema_name::text as schema_name,
           table_name::text as table_name,
           total_size_gb::text as total_size_gb,
           seg_min_size_gb::text as seg_min_size_gb,
           seg_max_size_gb::text as seg_max_size_gb,
           seg_avg_size_gb::text as seg_avg_size_gb,
           seg_gap_min_max_percent::text as seg_gap_min_max_percent,
           seg_gap_min_max_gb::text as seg_gap_min_max_gb,
           nb_empty_seg::text as nb_empty_seg
    from public.fn_get_skew()"#;

/// Emits one sample per skewed table across all databases.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataSkewCollector;

#[async_trait]
impl PerDatabase<PgSession> for DataSkewCollector {
    async fn scrape_database(
        &self,
        target: &PgSession,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        debug!("Installing fn_get_skew");
        sqlx::query(CREATE_SKEW_FN_SQL).execute(target.pool()).await?;
        sqlx::query(QUIET_NOTICES_SQL).execute(target.pool()).await?;
        query_into_sink(target, GET_SKEW_SQL, &DATA_SKEW_DETAIL, sink).await?;
        Ok(())
    }
}

#[async_trait]
impl Collector<PgSession> for DataSkewCollector {
    fn identity(&self) -> &str {
        NAME
    }

    async fn collect(
        &self,
        session: &PgSession,
        _version: ServerVersion,
        sink: &mut dyn SampleSink,
    ) -> Result<(), CollectorError> {
        scrape_each_database(self, NAME, session, sink).await
    }
}
