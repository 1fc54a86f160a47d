use tempfile::tempdir;

mod common;

const INPUT: &str = "c1,c2,c3\nval45,val2,val3\nval40,val2,val6\n";

#[test]
fn test_analyze_offsets_and_keys() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let input = common::write_input(dir.path(), INPUT);
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_header();
        options.with_fields(vec!["c2".to_string(), "c1".to_string()]);
    });

    indexer.analyze()?;

    let records = indexer.records();
    assert_eq!(records.len(), 3);
    assert_eq!((records[0].key.as_slice(), records[0].offset, records[0].length), (&b""[..], 0, 9));
    assert_eq!(records[1].key, common::comparable(&["val2", "val45"]));
    assert_eq!((records[1].offset, records[1].length), (9, 16));
    assert_eq!(records[2].key, common::comparable(&["val2", "val40"]));
    assert_eq!((records[2].offset, records[2].length), (25, 16));
    Ok(())
}

#[test]
fn test_analyze_without_header_rejects_bad_fields() {
    let dir = tempdir().unwrap();
    let input = common::write_input(dir.path(), "val1,val2,val3\nval4,val5,val6\n");
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_fields(vec!["c2".to_string(), "c1".to_string()]);
    });

    let err = indexer.analyze().unwrap_err();
    assert_eq!(err.to_string(), "Field c2 do not match with pattern /var\\d+/");
}

#[test]
fn test_analyze_without_header() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let input = common::write_input(dir.path(), "val1,val2,val3\nval4,val5,val6\nval7,val8,val9\n");
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_fields(vec!["var2".to_string()]);
    });

    indexer.analyze()?;

    let keys: Vec<Vec<u8>> = indexer.records().iter().map(|r| r.key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            common::comparable(&["val2"]),
            common::comparable(&["val5"]),
            common::comparable(&["val8"]),
        ]
    );
    Ok(())
}

#[test]
fn test_analyze_with_empty_cells() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let input = common::write_input(dir.path(), "c1,c2,c3\nval45,val2,\nval40,val2,val6\n");
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_header();
        options.with_fields(vec!["c3".to_string()]);
    });

    indexer.analyze()?;

    let records = indexer.records();
    assert_eq!((records[0].key.as_slice(), records[0].offset, records[0].length), (&b""[..], 0, 9));
    assert_eq!(records[1].key, common::comparable(&[""]));
    assert_eq!((records[1].offset, records[1].length), (9, 12));
    assert_eq!(records[2].key, common::comparable(&["val6"]));
    assert_eq!((records[2].offset, records[2].length), (21, 16));
    Ok(())
}

#[test]
fn test_analyze_keeps_blank_keys_by_default() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let input = common::write_input(dir.path(), "c1,c2,c3\n1,0,42\n10,0,42\n,,42\n");
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_header();
        options.with_fields(vec!["c1".to_string(), "c2".to_string()]);
    });

    indexer.analyze()?;

    let records = indexer.records();
    assert_eq!(records.len(), 4);
    assert_eq!(records[1].key, common::comparable(&["1", "0"]));
    assert_eq!((records[1].offset, records[1].length), (9, 7));
    assert_eq!(records[2].key, common::comparable(&["10", "0"]));
    assert_eq!((records[2].offset, records[2].length), (16, 8));
    assert_eq!(records[3].key, common::comparable(&["", ""]));
    assert_eq!((records[3].offset, records[3].length), (24, 5));
    Ok(())
}

#[test]
fn test_analyze_drops_blank_keys() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let input = common::write_input(dir.path(), "c1,c2,c3\n1,0,42\n10,0,42\n,,42\n");
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_header();
        options.with_drop_empty_keys();
        options.with_fields(vec!["c1".to_string(), "c2".to_string()]);
    });

    indexer.analyze()?;

    let records = indexer.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].key, b"");
    assert_eq!(records[1].key, common::comparable(&["1", "0"]));
    assert_eq!(records[2].key, common::comparable(&["10", "0"]));
    Ok(())
}

#[test]
fn test_analyze_unknown_field() {
    let dir = tempdir().unwrap();
    let input = common::write_input(dir.path(), INPUT);
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_header();
        options.with_fields(vec!["___c2".to_string(), "___c1".to_string()]);
    });

    let err = indexer.analyze().unwrap_err();
    assert_eq!(err.to_string(), "Invalid separator or sort fields");
}

#[test]
fn test_analyze_empty_input() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let input = common::write_input(dir.path(), "");
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_header();
        options.with_fields(vec!["c1".to_string()]);
    });

    indexer.analyze()?;
    indexer.sort();
    assert!(indexer.records().is_empty());
    Ok(())
}

#[test]
fn test_analyze_skips_malformed_rows() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let input = common::write_input(dir.path(), "c1,c2,c3\n1,0,42\n10,0,42\n42,\n");
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_header();
        options.with_skip_malformed();
        options.with_fields(vec!["c1".to_string(), "c3".to_string()]);
    });

    indexer.analyze()?;

    let records = indexer.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].key, common::comparable(&["1", "42"]));
    assert_eq!(records[2].key, common::comparable(&["10", "42"]));
    Ok(())
}

#[test]
fn test_analyze_reports_quote_errors() {
    let dir = tempdir().unwrap();
    let input = common::write_input(dir.path(), "c1,c2,c3\nval1,val\"2,val3\n");
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_header();
        options.with_fields(vec!["c1".to_string()]);
    });

    let err = indexer.analyze().unwrap_err();
    assert_eq!(err.to_string(), "line 1, column 9: bare \" in non-quoted-field");
}

#[test]
fn test_sort_orders_by_key() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let input = common::write_input(dir.path(), INPUT);
    let mut indexer = common::indexer_over(&input, |options| {
        options.with_header();
        options.with_fields(vec!["c2".to_string(), "c1".to_string()]);
    });

    indexer.analyze()?;
    indexer.sort();

    let keys: Vec<Vec<u8>> = indexer.records().iter().map(|r| r.key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            Vec::new(),
            common::comparable(&["val2", "val40"]),
            common::comparable(&["val2", "val45"]),
        ]
    );
    Ok(())
}
