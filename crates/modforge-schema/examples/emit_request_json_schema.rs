use modforge_schema::request_json_schema;

fn main() {
    let schema = request_json_schema();
    let json = serde_json::to_string_pretty(&schema).expect("serialize request json schema");
    println!("{json}");
}
