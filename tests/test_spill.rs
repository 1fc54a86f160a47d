use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use tsv_sort::memory_probe::FixedMemoryProbe;
use tsv_sort::swapper::Swapper;

mod common;

// A limit just above the reserved headroom combined with a probe reporting
// huge resident memory makes the swapper spill whenever the index vector is
// at capacity.
fn pressured_swapper(scratch: &Path) -> Swapper {
    let mut swapper = Swapper::new((200 << 20) + 1024, scratch).unwrap();
    swapper.with_probe(Arc::new(FixedMemoryProbe::new(1 << 40)));
    swapper.with_chunk_size(Box::new(|_| 2));
    swapper
}

#[test]
fn test_spill_and_merge() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let scratch = dir.path().join("scratch");
    let content = "c1,c2\n05,e\n03,c\n12,l\n01,a\n09,i\n07,g\n11,k\n02,b\n08,h\n10,j\n04,d\n06,f\n";
    let input = common::write_input(dir.path(), content);
    let output = common::temp_file_name(dir.path());

    let swapper = pressured_swapper(&scratch);
    let mut indexer = common::indexer_over(&input, move |options| {
        options.with_header();
        options.with_fields(vec!["c1".to_string()]);
        options.with_swapper(swapper);
    });

    indexer.analyze()?;
    assert!(indexer.swapper().has_spilled());
    assert!(indexer.swapper().run_count() >= 2);
    // the whole index lives on disk now
    assert!(indexer.records().is_empty());

    indexer.sort();
    indexer.transfer(File::create(&output)?)?;

    assert_eq!(
        common::read_output(&output),
        "c1,c2\n01,a\n02,b\n03,c\n04,d\n05,e\n06,f\n07,g\n08,h\n09,i\n10,j\n11,k\n12,l\n"
    );
    Ok(())
}

#[test]
fn test_spill_writes_and_erases_scratch() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let scratch = dir.path().join("scratch");
    let content = "c1,c2\nl,01\nk,02\nj,03\ni,04\nh,05\ng,06\nf,07\ne,08\nd,09\nc,10\nb,11\na,12\n";
    let input = common::write_input(dir.path(), content);
    let output = common::temp_file_name(dir.path());

    let swapper = pressured_swapper(&scratch);
    let mut indexer = common::indexer_over(&input, move |options| {
        options.with_header();
        options.with_fields(vec!["c1".to_string()]);
        options.with_swapper(swapper);
    });

    indexer.analyze()?;
    assert!(std::fs::read_dir(&scratch)?.count() > 0);

    indexer.sort();
    indexer.transfer(File::create(&output)?)?;

    // scratch blobs are erased once the transfer succeeded
    assert_eq!(std::fs::read_dir(&scratch)?.count(), 0);
    assert_eq!(
        common::read_output(&output),
        "c1,c2\na,12\nb,11\nc,10\nd,09\ne,08\nf,07\ng,06\nh,05\ni,04\nj,03\nk,02\nl,01\n"
    );
    Ok(())
}

#[test]
fn test_spill_preserves_order_of_equal_keys() -> Result<(), anyhow::Error> {
    let dir = tempdir()?;
    let scratch = dir.path().join("scratch");
    let content = "k,1\nk,2\nk,3\nk,4\nk,5\nk,6\nk,7\nk,8\n";
    let input = common::write_input(dir.path(), content);
    let output = common::temp_file_name(dir.path());

    let swapper = pressured_swapper(&scratch);
    let mut indexer = common::indexer_over(&input, move |options| {
        options.with_fields(vec!["var1".to_string()]);
        options.with_swapper(swapper);
    });

    indexer.analyze()?;
    assert!(indexer.swapper().has_spilled());

    indexer.sort();
    indexer.transfer(File::create(&output)?)?;

    // ties resolve to the run that was spilled first, which preserves the
    // input order of equal keys
    assert_eq!(common::read_output(&output), content);
    Ok(())
}
