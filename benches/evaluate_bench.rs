use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rules_vm::{evaluate, Document};
use serde_json::json;

fn sample_document() -> Document {
    serde_json::from_value(json!({
        "definitions": {
            "income": { "type": "number", "value": 62000, "required": true },
            "dependents": { "type": "number", "value": 2 },
            "tax_bracket": { "type": "string", "readonly": true },
            "filing_complete": { "type": "boolean", "value": false }
        },
        "state_model": {
            "inputs": ["income", "dependents"],
            "derived": {
                "adjusted_income": {
                    "eval": { "-": [{ "var": "income" }, { "*": [{ "var": "dependents" }, 1000] }] }
                }
            }
        },
        "logic_tree": [
            {
                "id": "low_bracket",
                "when": { "<": [{ "var": "adjusted_income" }, 50000] },
                "then": { "set": { "tax_bracket": "low" } }
            },
            {
                "id": "high_bracket",
                "when": { ">=": [{ "var": "adjusted_income" }, 50000] },
                "then": { "set": { "tax_bracket": "high" } }
            },
            {
                "id": "mark_complete",
                "when": { "!=": [{ "var": "tax_bracket" }, null] },
                "then": { "set": { "filing_complete": true } }
            }
        ]
    }))
    .expect("sample document is well-formed")
}

fn bench_evaluate(c: &mut Criterion) {
    let document = sample_document();
    let instant = Utc::now();
    c.bench_function("evaluate_sample_document", |b| {
        b.iter(|| evaluate(black_box(&document), black_box(instant)))
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
