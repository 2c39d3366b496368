//! Benchmarks for the log line parsers.
//! Run with: cargo bench -p logflow-parser

use logflow_parser::for_format;

const JSON_LINE: &str = r#"{"timestamp":"2025-03-01T12:00:00Z","level":"info","message":"request handled","status_code":200,"response_time":12.5,"path":"/api/v1/items","ip_address":"192.0.2.10","user_agent":"Mozilla/5.0"}"#;
const COMBINED_LINE: &str = r#"192.0.2.10 - - [01/Mar/2025:12:00:00 +0000] "GET /api/v1/items HTTP/1.1" 200 512 "-" "Mozilla/5.0""#;

fn bench(name: &str, format: &str, line: &str, iterations: u32) {
    let parser = for_format(format);

    // Warmup
    for _ in 0..1_000 {
        parser.parse(line).unwrap();
    }

    let start = std::time::Instant::now();
    for _ in 0..iterations {
        let _ = parser.parse(line).unwrap();
    }
    let elapsed = start.elapsed();

    println!("=== {name} ===");
    println!("Iterations:  {iterations}");
    println!("Total time:  {elapsed:?}");
    println!("Per line:    {:?}", elapsed / iterations);
    println!(
        "Throughput:  {:.0} lines/sec",
        iterations as f64 / elapsed.as_secs_f64()
    );
}

fn main() {
    let iterations = 1_000_000;
    bench("JSON parser", "json", JSON_LINE, iterations);
    bench("Apache Combined parser", "combined", COMBINED_LINE, iterations);
    bench("Common Log parser", "common", COMBINED_LINE, iterations);
}
