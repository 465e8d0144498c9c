use anyhow::Result;

fn main() -> Result<()> {
    let mut book = umya_spreadsheet::new_file();

    let sheet = book.get_active_sheet_mut();
    sheet.get_cell_mut("A1").set_value("Project");
    sheet.get_cell_mut("B1").set_formula("COUNTA(Lookup!A:A)");

    // The filler writes project codes into column A of this sheet.
    let lookup = book
        .new_sheet("Lookup")
        .map_err(|e| anyhow::anyhow!("cannot create Lookup sheet: {e}"))?;
    lookup.get_cell_mut("A1").set_value("placeholder");
    lookup.get_cell_mut("B1").set_value("column B is left alone");

    std::fs::create_dir_all("templates")?;
    umya_spreadsheet::writer::xlsx::write(&book, "templates/base_template.xlsx")?;
    println!("Wrote templates/base_template.xlsx");
    Ok(())
}
