/*!
# Filter Benchmarks

Benchmarks for filter compilation and paginated search execution.

## Usage

```bash
# Run all benchmarks
cargo bench --bench filter_benchmarks

# Run specific benchmark group
cargo bench --bench filter_benchmarks -- "Filter Compilation"

# Quick benchmark with fewer samples
cargo bench --bench filter_benchmarks -- --quick
```

HTML reports are generated in `target/criterion/report/index.html`.
*/

use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, FromQueryResult};
use searchcrate::sql::{Params, SelectQuery, SqlExpr};
use searchcrate::{
    FilterCache, FilterData, Provider, SearchConfig, SearchContext, SearchResult, SimpleFieldResolver,
};
use tokio::runtime::Runtime;

const FILTERS: &[(&str, &str)] = &[
    ("simple", "status = 'active'"),
    ("grouped", "(title ~ 'rust' || views > 100) && created >= @monthStart && status != null"),
    (
        "functions",
        "geoDistance(lon, lat, 23.44920680886216, 42.7078484153991) < 25 && strftime('%Y', created) = '2024'",
    ),
];

#[derive(Debug, FromQueryResult)]
#[allow(dead_code)]
struct Post {
    id: i32,
    title: String,
    views: i64,
}

fn resolver() -> SimpleFieldResolver {
    SimpleFieldResolver::new(["id", "title", "status", "views", "created", "lon", "lat"]).unwrap()
}

fn compile(context: &SearchContext, filter: &str) -> String {
    let expr = FilterData::from(filter).build_expr(context, &mut resolver()).unwrap();
    let mut params = Params::new();
    expr.build(&mut params)
}

async fn setup_benchmark_db(size: usize) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    db.execute_unprepared(
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT NOT NULL, status TEXT, views INTEGER NOT NULL, created TEXT NOT NULL, lon REAL, lat REAL)",
    )
    .await?;

    for id in 0..size {
        let status = if id % 3 == 0 { "'active'" } else { "NULL" };
        db.execute_unprepared(&format!(
            "INSERT INTO posts VALUES ({id}, 'Post {id} about rust', {status}, {views}, '2024-01-{day:02} 10:00:00.000Z', 23.2, 42.7)",
            views = id * 7 % 500,
            day = id % 28 + 1,
        ))
        .await?;
    }

    Ok(db)
}

async fn benchmark_search(db: &DatabaseConnection, context: &SearchContext, query: &str) -> SearchResult<Post> {
    let mut provider = Provider::new(context.clone(), resolver());
    provider.query(SelectQuery::new("posts")).parse(query).unwrap();
    provider.exec(db).await.unwrap()
}

fn bench_filter_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Filter Compilation");

    let cached = SearchContext::default();
    let uncached = SearchContext::default().with_cache(Arc::new(FilterCache::new(0)));

    for (name, filter) in FILTERS {
        group.bench_with_input(BenchmarkId::new("cached", name), filter, |b, filter| {
            b.iter(|| std::hint::black_box(compile(&cached, filter)));
        });
        group.bench_with_input(BenchmarkId::new("uncached", name), filter, |b, filter| {
            b.iter(|| std::hint::black_box(compile(&uncached, filter)));
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let context = SearchContext::new(SearchConfig::default());

    for size in [100, 1000] {
        let db = rt.block_on(setup_benchmark_db(size)).unwrap();

        let mut group = c.benchmark_group(format!("Search SQLite ({size} records)"));
        group.measurement_time(Duration::from_secs(10));

        let queries = [
            ("first_page", "page=1&perPage=30"),
            ("filtered", "filter=status%3D'active'%20%26%26%20views%3E100&sort=-views"),
            ("skip_total", "filter=title~'Post%201%20about%20rust'&skipTotal=1"),
            ("last_page", "page=1000&perPage=50&sort=-created,id"),
        ];

        for (name, query) in queries {
            group.bench_with_input(BenchmarkId::new(name, size), &query, |b, query| {
                b.iter(|| rt.block_on(std::hint::black_box(benchmark_search(&db, &context, query))));
            });
        }

        group.finish();
    }
}

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(30)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
        .with_plots()
        .with_output_color(true)
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_filter_compilation, bench_search
}
criterion_main!(benches);
