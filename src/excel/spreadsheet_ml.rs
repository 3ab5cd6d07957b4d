//! XML Spreadsheet 2003 (SpreadsheetML) reader
//!
//! Market reports are exported as `.xls` files that are really SpreadsheetML
//! text. Only the first `Worksheet`'s first `Table` is read. Each `Row`
//! becomes a list of cell texts in document order; `ss:Index` and
//! `ss:MergeAcross` are not expanded. Elements are matched by local name so
//! the `ss:` prefix is optional.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{ExsimError, ExsimResult};

/// Tracks where the reader currently is in the document tree.
#[derive(Debug, Default)]
struct SheetScanner {
    worksheet_seen: bool,
    in_worksheet: bool,
    table_seen: bool,
    in_table: bool,
    row: Option<Vec<String>>,
    cell: Option<String>,
    data_seen: bool,
    /// > 0 while inside the cell's `Data` (nested rich-text tags increase it)
    data_depth: usize,
    /// Open elements inside the cell other than its `Data`, e.g. `Comment`
    cell_depth: usize,
    finished: bool,
    rows: Vec<Vec<String>>,
}

impl SheetScanner {
    fn open(&mut self, name: &[u8], empty: bool) {
        match name {
            b"Worksheet" if !self.worksheet_seen => {
                self.worksheet_seen = true;
                if empty {
                    self.finished = true;
                } else {
                    self.in_worksheet = true;
                }
            }
            b"Table" if self.in_worksheet && !self.table_seen => {
                self.table_seen = true;
                self.in_table = !empty;
            }
            b"Row" if self.in_table && self.row.is_none() => {
                if empty {
                    self.rows.push(Vec::new());
                } else {
                    self.row = Some(Vec::new());
                }
            }
            b"Cell" if self.row.is_some() && self.cell.is_none() => {
                if empty {
                    if let Some(row) = self.row.as_mut() {
                        row.push(String::new());
                    }
                } else {
                    self.cell = Some(String::new());
                    self.data_seen = false;
                    self.cell_depth = 0;
                }
            }
            // Only a direct child of the cell holds its value
            b"Data"
                if self.cell.is_some()
                    && self.cell_depth == 0
                    && self.data_depth == 0
                    && !self.data_seen =>
            {
                self.data_seen = true;
                if !empty {
                    self.data_depth = 1;
                }
            }
            _ if self.data_depth > 0 && !empty => self.data_depth += 1,
            _ if self.cell.is_some() && !empty => self.cell_depth += 1,
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        if self.data_depth > 0 {
            self.data_depth -= 1;
            return;
        }
        if self.cell.is_some() && self.cell_depth > 0 {
            self.cell_depth -= 1;
            return;
        }

        match name {
            b"Cell" => {
                if let (Some(text), Some(row)) = (self.cell.take(), self.row.as_mut()) {
                    row.push(text);
                }
            }
            b"Row" => {
                if let Some(row) = self.row.take() {
                    self.rows.push(row);
                }
            }
            b"Table" if self.in_table => self.in_table = false,
            b"Worksheet" if self.in_worksheet => {
                self.in_worksheet = false;
                self.finished = true;
            }
            _ => {}
        }
    }

    fn capturing(&self) -> bool {
        self.data_depth > 0 && self.cell.is_some()
    }

    fn push_text(&mut self, text: &str) {
        if let Some(cell) = self.cell.as_mut() {
            cell.push_str(text);
        }
    }
}

/// Read the rows of the first worksheet table.
///
/// A document without a `Worksheet`, or whose first worksheet has no
/// `Table`, fails with [`ExsimError::MissingContainer`].
pub fn read_rows(bytes: &[u8]) -> ExsimResult<Vec<Vec<String>>> {
    let mut reader = Reader::from_reader(bytes);
    let mut scanner = SheetScanner::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => scanner.open(e.local_name().as_ref(), false),
            Ok(Event::Empty(e)) => scanner.open(e.local_name().as_ref(), true),
            Ok(Event::End(e)) => scanner.close(e.local_name().as_ref()),
            Ok(Event::Text(e)) if scanner.capturing() => {
                let text = e.unescape()?;
                scanner.push_text(&text);
            }
            Ok(Event::CData(e)) if scanner.capturing() => {
                let raw = e.into_inner();
                scanner.push_text(&String::from_utf8_lossy(&raw));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ExsimError::Xml(format!(
                    "Malformed SpreadsheetML at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
        if scanner.finished {
            break;
        }
        buf.clear();
    }

    if !scanner.worksheet_seen {
        return Err(ExsimError::MissingContainer(
            "no Worksheet element in report".to_string(),
        ));
    }
    if !scanner.table_seen {
        return Err(ExsimError::MissingContainer(
            "no Table element in the first Worksheet".to_string(),
        ));
    }

    Ok(scanner.rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workbook(body: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<Workbook xmlns="urn:schemas-microsoft-com:office:spreadsheet"
 xmlns:ss="urn:schemas-microsoft-com:office:spreadsheet">
{body}
</Workbook>"#
        )
    }

    #[test]
    fn test_reads_prefixed_rows() {
        let xml = workbook(
            r#"<ss:Worksheet ss:Name="Report"><ss:Table>
  <ss:Row><ss:Cell><ss:Data ss:Type="String">Price</ss:Data></ss:Cell></ss:Row>
  <ss:Row>
    <ss:Cell><ss:Data ss:Type="String">Center</ss:Data></ss:Cell>
    <ss:Cell><ss:Data ss:Type="Number">520</ss:Data></ss:Cell>
  </ss:Row>
</ss:Table></ss:Worksheet>"#,
        );
        let rows = read_rows(xml.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![vec!["Price".to_string()], vec!["Center".to_string(), "520".to_string()]]
        );
    }

    #[test]
    fn test_comment_data_is_not_the_cell_value() {
        let xml = workbook(
            r#"<Worksheet><Table><Row>
  <Cell><Comment ss:Author="A3"><Data>check this</Data></Comment><Data ss:Type="Number">5</Data></Cell>
  <Cell><Data ss:Type="String">next</Data><Comment><Data>late note</Data></Comment></Cell>
  <Cell><Comment><ss:Data>only a note</ss:Data></Comment></Cell>
</Row></Table></Worksheet>"#,
        );
        let rows = read_rows(xml.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![vec!["5".to_string(), "next".to_string(), String::new()]]
        );
    }

    #[test]
    fn test_cells_without_data_are_empty_strings() {
        let xml = workbook(
            r#"<Worksheet><Table><Row>
  <Cell/>
  <Cell ss:StyleID="s1"></Cell>
  <Cell><Data ss:Type="String"/></Cell>
  <Cell><Data ss:Type="String">Low</Data></Cell>
</Row><Row/></Table></Worksheet>"#,
        );
        let rows = read_rows(xml.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["", "", "", "Low"]);
        assert!(rows[1].is_empty());
    }

    #[test]
    fn test_rich_text_and_entities_are_flattened() {
        let xml = workbook(
            r#"<Worksheet><Table><Row>
  <Cell><ss:Data ss:Type="String" xmlns="http://www.w3.org/TR/REC-html40"><Font>Market Share</Font> Per Region (%)</ss:Data></Cell>
  <Cell><Data ss:Type="String">R&amp;D</Data></Cell>
</Row></Table></Worksheet>"#,
        );
        let rows = read_rows(xml.as_bytes()).unwrap();
        assert_eq!(rows[0], vec!["Market Share Per Region (%)", "R&D"]);
    }

    #[test]
    fn test_comments_inside_cells_are_ignored() {
        let xml = workbook(
            r#"<Worksheet><Table><Row><Cell>
  <Data ss:Type="Number">12.5</Data>
  <Comment><Data>reviewer note</Data></Comment>
</Cell></Row></Table></Worksheet>"#,
        );
        let rows = read_rows(xml.as_bytes()).unwrap();
        assert_eq!(rows[0], vec!["12.5"]);
    }

    #[test]
    fn test_only_first_worksheet_is_read() {
        let xml = workbook(
            r#"<Worksheet ss:Name="One"><Table><Row><Cell><Data>first</Data></Cell></Row></Table></Worksheet>
<Worksheet ss:Name="Two"><Table><Row><Cell><Data>second</Data></Cell></Row></Table></Worksheet>"#,
        );
        let rows = read_rows(xml.as_bytes()).unwrap();
        assert_eq!(rows, vec![vec!["first".to_string()]]);
    }

    #[test]
    fn test_missing_worksheet_is_fatal() {
        let xml = workbook("<Styles/>");
        let err = read_rows(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, ExsimError::MissingContainer(_)));
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let xml = workbook(r#"<Worksheet ss:Name="Empty"><WorksheetOptions/></Worksheet>"#);
        let err = read_rows(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, ExsimError::MissingContainer(msg) if msg.contains("Table")));
    }

    #[test]
    fn test_malformed_xml_is_an_xml_error() {
        let xml = "<?xml version=\"1.0\"?><Workbook><Worksheet><Table></Row></Table></Worksheet></Workbook>";
        let err = read_rows(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, ExsimError::Xml(_)));
    }
}
