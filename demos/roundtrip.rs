use csvio_rs::{CsvReader, CsvWriter, TextEncoding};

fn main() {
    println!("=== CSV Round-trip Examples ===\n");

    // Example 1: Write UTF-16 with a byte order mark
    println!("1. Write UTF-16LE with BOM:");
    let mut writer = CsvWriter::new();
    writer.set_delimiter(';').unwrap();
    writer.set_output_encoding(TextEncoding::Utf16Le).unwrap();
    writer.open(Vec::new()).unwrap();
    writer.write_byte_order_mark().unwrap();
    writer
        .bind_columns(
            [("id", "ID"), ("name", "Name"), ("price", "Price"), ("tags", "Tags")],
            true,
        )
        .unwrap();
    writer
        .write_record([("id", "1"), ("name", "Käse; mild"), ("price", "4,50"), ("tags", "food|dairy")])
        .unwrap();
    writer
        .write_record([("id", "2"), ("name", "Brot"), ("price", "2,10"), ("tags", "")])
        .unwrap();
    let bytes = writer.detach().unwrap();
    println!("{} bytes, starting with {:02X?}\n", bytes.len(), &bytes[..4]);

    // Example 2: Read it back, letting the BOM pick the encoding
    println!("2. Read back with BOM detection:");
    let mut reader = CsvReader::new();
    reader.set_delimiter(';').unwrap();
    reader.set_input_encoding(TextEncoding::for_label("UTF-16").unwrap()).unwrap();
    reader.open(bytes.as_slice()).unwrap();
    println!(
        "detected {:?}, resolved {:?}\n",
        reader.bom(),
        reader.resolved_encoding()
    );

    // Example 3: Records with casts
    println!("3. Records with casts:");
    reader.read_columns().unwrap();
    reader
        .set_casts([
            ("ID", "int"),
            ("Price", "number:,"),
            ("Tags", "split|defaultNull"),
        ])
        .unwrap();
    for record in reader.records() {
        let record = record.unwrap();
        println!("{:?}", record);
    }
    println!();

    // Example 4: Custom converter
    println!("4. Custom converter:");
    let mut reader = CsvReader::open_string("a,b\nshout,whisper\n", true).unwrap();
    reader.read_columns().unwrap();
    reader
        .add_converter("exclaim", |value, args| {
            let mark = args.first().map(String::as_str).unwrap_or("!");
            value
                .as_str()
                .map(|text| format!("{text}{mark}").into())
                .unwrap_or(value)
        })
        .unwrap();
    reader.set_casts([("a", "upper|exclaim"), ("b", "exclaim:?")]).unwrap();
    println!("{:?}", reader.read_record().unwrap());
}
