use super::Metafile;
use std::cmp::Reverse;

struct Row {
    name: String,
    size: String,
    percent: String,
}

/// Human-readable size breakdown of every output.
///
/// Outputs are listed largest first, each followed by its inputs ordered by
/// the bytes they contributed. Columns are aligned across the whole table.
pub fn analyze_metafile(metafile: &Metafile) -> String {
    let mut outputs: Vec<_> = metafile.outputs.iter().collect();
    outputs.sort_by_key(|(path, output)| (Reverse(output.bytes), *path));

    let mut groups: Vec<Vec<Row>> = Vec::with_capacity(outputs.len());
    for (path, output) in outputs {
        let mut rows = vec![Row {
            name: format!("  {path}"),
            size: format_size(output.bytes),
            percent: "100.0%".to_string(),
        }];
        let mut inputs: Vec<_> = output.inputs.iter().collect();
        inputs.sort_by_key(|(path, input)| (Reverse(input.bytes_in_output), *path));
        let last = inputs.len().saturating_sub(1);
        for (i, (input_path, input)) in inputs.into_iter().enumerate() {
            let glyph = if i == last { '└' } else { '├' };
            rows.push(Row {
                name: format!("   {glyph} {input_path}"),
                size: format_size(input.bytes_in_output),
                percent: percent(input.bytes_in_output, output.bytes),
            });
        }
        groups.push(rows);
    }

    let width = |column: fn(&Row) -> &str| {
        groups
            .iter()
            .flatten()
            .map(|row| column(row).chars().count())
            .max()
            .unwrap_or(0)
    };
    let name_width = width(|row| row.name.as_str());
    let size_width = width(|row| row.size.as_str());
    let percent_width = width(|row| row.percent.as_str());

    let mut out = String::new();
    for rows in &groups {
        out.push('\n');
        for row in rows {
            let name_pad = name_width - row.name.chars().count();
            out.push_str(&format!(
                "{}{:name_pad$}  {:>size_width$}  {:>percent_width$}\n",
                row.name, "", row.size, row.percent
            ));
        }
    }
    out
}

fn percent(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", part as f64 * 100.0 / whole as f64)
}

/// `512b`, `4.0kb`, `1.5mb`, `2.0gb`.
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KB {
        format!("{bytes}b")
    } else if value < KB * KB {
        format!("{:.1}kb", value / KB)
    } else if value < KB * KB * KB {
        format!("{:.1}mb", value / (KB * KB))
    } else {
        format!("{:.1}gb", value / (KB * KB * KB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metafile::MetafileOutput;

    fn output(bytes: usize, inputs: &[(&str, usize)]) -> MetafileOutput {
        let mut output = MetafileOutput::new(bytes);
        for (path, bytes) in inputs {
            output.add_input(path, *bytes);
        }
        output
    }

    #[test]
    fn test_single_output_layout() {
        let mut metafile = Metafile::default();
        metafile.outputs.insert("out.js".into(), output(4096, &[("in.js", 1024)]));
        assert_eq!(
            analyze_metafile(&metafile),
            "\n  out.js    4.0kb  100.0%\n   └ in.js  1.0kb   25.0%\n"
        );
    }

    #[test]
    fn test_outputs_and_inputs_sorted_by_size() {
        let mut metafile = Metafile::default();
        metafile.outputs.insert("out/small.js".into(), output(100, &[("b.js", 100)]));
        metafile
            .outputs
            .insert("out/big.js".into(), output(3000, &[("z.js", 1000), ("a.js", 2000), ("c.js", 0)]));
        assert_eq!(
            analyze_metafile(&metafile),
            concat!(
                "\n",
                "  out/big.js    2.9kb  100.0%\n",
                "   ├ a.js       2.0kb   66.7%\n",
                "   ├ z.js       1000b   33.3%\n",
                "   └ c.js          0b    0.0%\n",
                "\n",
                "  out/small.js   100b  100.0%\n",
                "   └ b.js        100b  100.0%\n",
            )
        );
    }

    #[test]
    fn test_size_units() {
        assert_eq!(format_size(0), "0b");
        assert_eq!(format_size(1023), "1023b");
        assert_eq!(format_size(1536), "1.5kb");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0mb");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0gb");
    }

    #[test]
    fn test_empty_metafile() {
        assert_eq!(analyze_metafile(&Metafile::default()), "");
    }
}
