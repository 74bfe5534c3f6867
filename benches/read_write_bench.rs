use criterion::{black_box, criterion_group, criterion_main, Criterion};
use csvio_rs::{CastSpec, Converters, CsvReader, CsvWriter, TextEncoding};

fn get_rows() -> Vec<Vec<String>> {
    (0..1_000)
        .map(|i| {
            vec![
                i.to_string(),
                format!("user{i}"),
                format!("{i}, \"quoted\" street"),
                format!("{}.{:02}", i * 3, i % 100),
                "tag1|tag2|tag3".to_string(),
                if i % 2 == 0 { "1" } else { "0" }.to_string(),
            ]
        })
        .collect()
}

fn write_rows(rows: &[Vec<String>], encoding: TextEncoding) -> Vec<u8> {
    let mut writer = CsvWriter::new();
    writer.set_output_encoding(encoding).unwrap();
    writer.open(Vec::new()).unwrap();
    for row in rows {
        writer.write_row(row.iter().map(String::as_str)).unwrap();
    }
    writer.detach().unwrap()
}

fn benchmark_write(c: &mut Criterion) {
    let rows = get_rows();

    c.bench_function("write_rows_utf8", |b| {
        b.iter(|| write_rows(black_box(&rows), TextEncoding::Utf8))
    });
    c.bench_function("write_rows_utf16le", |b| {
        b.iter(|| write_rows(black_box(&rows), TextEncoding::Utf16Le))
    });
}

fn benchmark_read(c: &mut Criterion) {
    let rows = get_rows();
    let utf8 = write_rows(&rows, TextEncoding::Utf8);
    let utf16 = write_rows(&rows, TextEncoding::Utf16Le);

    c.bench_function("read_rows_utf8", |b| {
        b.iter(|| {
            let mut reader = CsvReader::new();
            reader.open(black_box(utf8.as_slice())).unwrap();
            reader.rows().count()
        })
    });
    c.bench_function("read_rows_utf16le", |b| {
        b.iter(|| {
            let mut reader = CsvReader::new();
            reader.set_input_encoding(TextEncoding::Utf16Le).unwrap();
            reader.open(black_box(utf16.as_slice())).unwrap();
            reader.rows().count()
        })
    });
}

fn benchmark_records(c: &mut Criterion) {
    let utf8 = write_rows(&get_rows(), TextEncoding::Utf8);

    c.bench_function("read_records_with_casts", |b| {
        b.iter(|| {
            let mut reader = CsvReader::new();
            reader.open(black_box(utf8.as_slice())).unwrap();
            reader.set_columns(["id", "name", "street", "amount", "tags", "active"]);
            reader
                .set_casts([
                    ("id", "int"),
                    ("street", "trim|upper"),
                    ("amount", "number"),
                    ("tags", "split|trim"),
                    ("active", "bool"),
                ])
                .unwrap();
            reader.records().count()
        })
    });

    let converters = Converters::new();
    let pipeline = converters.compile(&CastSpec::from("trim|split:;|number:,:.")).unwrap();
    c.bench_function("apply_pipeline", |b| {
        b.iter(|| converters.apply(&pipeline, black_box(" 1.234,5;6,75;x ").into()))
    });
}

criterion_group!(benches, benchmark_write, benchmark_read, benchmark_records);
criterion_main!(benches);
