use kasboek_core::{CategoryType, Iban, Money, NewAccount, NewCategory, Period};
use kasboek_import::{import_statement, ImportError, ImportStage, KbcCsv};
use kasboek_storage::{accounts, categories, counterparts, create_db, transactions, DbPool};

const HEADER: &str = "Rekeningnummer;Rekening;Rekeninguittrekselnummer;Boekingsdatum;Transactie;Rekening tegenpartij;Naam tegenpartij bevat;Bedrag;Mededelingen\n";

async fn setup() -> (tempfile::TempDir, DbPool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = create_db(&dir.path().join("import.db")).await.unwrap();
    (dir, pool)
}

#[tokio::test]
async fn imports_and_classifies_statement() {
    let (_dir, pool) = setup().await;
    let mut conn = pool.acquire().await.unwrap();
    let owner = accounts::create(
        &mut conn,
        NewAccount {
            name: "Main".to_string(),
            iban: Iban::parse("BE68 5390 0754 7034").unwrap(),
        },
    )
    .await
    .unwrap();
    let groceries = categories::create(
        &mut conn,
        &owner,
        NewCategory {
            name: "Groceries".to_string(),
            category_type: CategoryType::Expenses,
            counterparts: vec!["acme".into()],
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .category;
    drop(conn);

    let csv = format!(
        "{HEADER}\
         x;BE68 5390 0754 7034;1;02/01/2024;1;BE71096123456769;Acme;-12,50;weekly shop\n\
         x;BE68 5390 0754 7034;1;09/01/2024;2;BE71096123456769;Acme;-7,25;\n\
         x;BE68 5390 0754 7034;1;10/01/2024;3;;Globex;1.250,00;salary\n"
    );
    let report = import_statement(&pool, &KbcCsv, "statement.csv", csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.rows_read, 3);
    assert_eq!(report.inserted(), 3);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].stage, ImportStage::Classified);
    assert_eq!(report.groups[0].counterparts, 2);

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(counterparts::list_by_owner(&mut conn, owner.id).await.unwrap().len(), 2);

    let rows = transactions::list_for_owner(&mut conn, &owner.iban, Period::all())
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        if row.counterpart_name == "acme" {
            assert_eq!(row.category_id, Some(groceries.id));
            assert_eq!(row.category_name.as_deref(), Some("Groceries"));
            assert_eq!(row.transaction_type, CategoryType::Expenses);
        } else {
            assert_eq!(row.counterpart_name, "globex");
            assert!(row.classification().is_uncategorized());
            assert_eq!(row.value, Money::from_cents(125000));
        }
    }
}

#[tokio::test]
async fn unknown_owner_fails_only_its_group() {
    let (_dir, pool) = setup().await;
    let mut conn = pool.acquire().await.unwrap();
    let owner = accounts::create(
        &mut conn,
        NewAccount {
            name: "Main".to_string(),
            iban: Iban::parse("BE68539007547034").unwrap(),
        },
    )
    .await
    .unwrap();
    drop(conn);

    let csv = format!(
        "{HEADER}\
         x;BE71096123456769;1;02/01/2024;1;;Acme;-1,00;\n\
         x;BE68539007547034;1;02/01/2024;1;;Acme;-1,00;\n\
         x;BE68539007547034;1;someday;1;;Acme;-2,00;\n"
    );
    let report = import_statement(&pool, &KbcCsv, "export.CSV", csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.groups.len(), 2);
    let ok = report
        .groups
        .iter()
        .find(|g| g.owner_iban == "BE68539007547034")
        .unwrap();
    assert!(ok.succeeded());
    assert_eq!(ok.inserted, 1);
    assert_eq!(ok.rejected.len(), 1);
    assert_eq!(ok.rejected[0].line, 4);

    let failed = report
        .groups
        .iter()
        .find(|g| g.owner_iban == "BE71096123456769")
        .unwrap();
    let ImportStage::Failed(reason) = &failed.stage else {
        panic!("expected a failed group, got {:?}", failed.stage);
    };
    assert!(reason.starts_with("after cleaned: "), "{reason}");
    assert!(reason.contains("not found"), "{reason}");
    assert_eq!(failed.inserted, 0);

    let mut conn = pool.acquire().await.unwrap();
    let rows = transactions::list_for_owner(&mut conn, &owner.iban, Period::all())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn rejects_wrong_extension_before_reading() {
    let (_dir, pool) = setup().await;
    let result = import_statement(&pool, &KbcCsv, "statement.xlsx", b"not even csv").await;
    assert!(matches!(result, Err(ImportError::UnsupportedFileType { .. })));
}

#[tokio::test]
async fn reimport_is_classified_consistently() {
    let (_dir, pool) = setup().await;
    let mut conn = pool.acquire().await.unwrap();
    let owner = accounts::create(
        &mut conn,
        NewAccount {
            name: "Main".to_string(),
            iban: Iban::parse("BE68539007547034").unwrap(),
        },
    )
    .await
    .unwrap();
    drop(conn);

    let csv = format!("{HEADER}x;BE68539007547034;1;02/01/2024;1;;ACME ;-1,00;\n");
    import_statement(&pool, &KbcCsv, "a.csv", csv.as_bytes()).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    categories::create(
        &mut conn,
        &owner,
        NewCategory {
            name: "Shops".to_string(),
            category_type: CategoryType::Expenses,
            counterparts: vec!["acme".into()],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    drop(conn);

    import_statement(&pool, &KbcCsv, "b.csv", csv.as_bytes()).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let rows = transactions::list_for_owner(&mut conn, &owner.iban, Period::all())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|t| t.category_name.as_deref() == Some("Shops")));
}
