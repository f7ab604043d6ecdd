pub fn render_schema(products_table: &str) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<PRODUCTS_TABLE>", products_table)
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_products.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_products.sql")),
				"tables/002_prompts.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_prompts.sql")),
				"tables/003_quotations.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_quotations.sql")),
				"tables/004_quotation_items.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_quotation_items.sql")),
				"tables/005_quotation_reports.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_quotation_reports.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
