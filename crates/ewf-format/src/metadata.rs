//! Device-information and case-data: the tab-separated header-value
//! tables carried UTF-16LE + BOM + deflate inside header/header2/
//! xheader section payloads.
//!
//! Grounded on `libewf_device_information.c`'s generate/parse pair for
//! field ordering and tolerance rules. Case-data's exact type codes
//! aren't given by name in the distilled contract beyond "an analogous
//! schema"; the codes below are filled in from the header-value field
//! list the source's headers carry (case number, evidence number,
//! examiner, notes, acquisition/system date, acquisition software and
//! platform, compression used, unique identifier) and recorded as an
//! open-question decision.

use crate::compression::{self, CompressionLevel, CompressionMethod};
use ewf_core::{Error, Result};

const BOM: u16 = 0xFEFF;

fn encode_utf16le_with_bom(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2 + 2);
    out.extend_from_slice(&BOM.to_le_bytes());
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

fn decode_utf16le_with_bom(bytes: &[u8]) -> Result<String> {
    if bytes.len() < 2 {
        return Err(Error::conversion("metadata buffer shorter than a BOM"));
    }
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    if units.first() == Some(&BOM) {
        units.remove(0);
    }
    String::from_utf16(&units).map_err(|e| Error::conversion(format!("invalid UTF-16: {e}")))
}

/// Compress a generated UTF-8 metadata string down to the on-disk wire
/// form: UTF-16LE with a leading BOM, deflate-compressed.
pub fn to_wire(text: &str) -> Result<Vec<u8>> {
    let utf16 = encode_utf16le_with_bom(text);
    match compression::compress(CompressionMethod::Deflate, CompressionLevel::Default, &utf16, None)? {
        compression::CompressOutcome::Ok(bytes) => Ok(bytes),
        compression::CompressOutcome::TooSmall => unreachable!("no budget was supplied"),
    }
}

/// Inflate and decode a header/header2/xheader section payload back to
/// the UTF-8 line grammar.
pub fn from_wire(bytes: &[u8]) -> Result<String> {
    let utf16 = compression::decompress(CompressionMethod::Deflate, bytes)?;
    decode_utf16le_with_bom(&utf16)
}

/// `dt` field: drive type letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveType {
    Removable,
    Fixed,
    Optical,
    Logical,
    Memory,
}

impl DriveType {
    fn letter(self) -> &'static str {
        match self {
            Self::Removable => "r",
            Self::Fixed => "f",
            Self::Optical => "c",
            Self::Logical => "l",
            Self::Memory => "m",
        }
    }

    fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "r" => Some(Self::Removable),
            "f" => Some(Self::Fixed),
            "c" => Some(Self::Optical),
            "l" => Some(Self::Logical),
            "m" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Device-information fields, as carried in the device_information
/// header-group section.
#[derive(Debug, Clone, Default)]
pub struct DeviceInformation {
    pub serial_number: String,
    pub model: String,
    pub device_label: String,
    pub number_of_sectors: Option<u64>,
    pub hpa_protected_sectors: Option<u64>,
    pub dco_protected_sectors: Option<u64>,
    pub drive_type: Option<DriveType>,
    pub process_identifier: String,
    pub bytes_per_sector: Option<u32>,
    pub is_physical: bool,
}

const DEVICE_INFO_CODES: [&str; 12] =
    ["sn", "md", "lb", "ts", "hs", "dc", "dt", "pid", "rs", "ls", "bp", "ph"];

/// Lines 1-4 of the device-information grammar, UTF-8, before wire encoding.
pub fn generate_device_information(info: &DeviceInformation) -> String {
    let values = [
        info.serial_number.clone(),
        info.model.clone(),
        info.device_label.clone(),
        info.number_of_sectors.map(|v| v.to_string()).unwrap_or_default(),
        info.hpa_protected_sectors.map(|v| v.to_string()).unwrap_or_default(),
        info.dco_protected_sectors.map(|v| v.to_string()).unwrap_or_default(),
        info.drive_type.map(|t| t.letter().to_string()).unwrap_or_default(),
        info.process_identifier.clone(),
        String::new(),
        String::new(),
        info.bytes_per_sector.map(|v| v.to_string()).unwrap_or_default(),
        if info.is_physical { "1".to_string() } else { String::new() },
    ];

    format!(
        "1\nmain\n{}\n{}\n",
        DEVICE_INFO_CODES.join("\t"),
        values.join("\t")
    )
}

/// Split a tab-separated line into fields, tolerating a trailing `\r`.
fn split_tab_line(line: &str) -> Vec<String> {
    line.trim_end_matches('\r').split('\t').map(str::to_string).collect()
}

pub fn parse_device_information(text: &str) -> Result<DeviceInformation> {
    let mut lines = text.lines();
    let _version = lines.next().ok_or_else(|| Error::conversion("missing line 1"))?;
    let _section_name = lines.next().ok_or_else(|| Error::conversion("missing line 2"))?;
    let codes_line = lines.next().ok_or_else(|| Error::conversion("missing type-code line"))?;
    let values_line = lines.next().unwrap_or("");

    let codes = split_tab_line(codes_line);
    let mut values = split_tab_line(values_line);
    values.resize(codes.len(), String::new());

    let mut info = DeviceInformation::default();
    for (code, value) in codes.iter().zip(values.iter()) {
        match code.as_str() {
            "sn" => info.serial_number = value.clone(),
            "md" => info.model = value.clone(),
            "lb" => info.device_label = value.clone(),
            "ts" => info.number_of_sectors = value.parse().ok(),
            "hs" => info.hpa_protected_sectors = value.parse().ok(),
            "dc" => info.dco_protected_sectors = value.parse().ok(),
            "dt" => info.drive_type = DriveType::from_letter(value),
            "pid" => info.process_identifier = value.clone(),
            "rs" | "ls" => {}
            "bp" => info.bytes_per_sector = value.parse().ok(),
            "ph" => info.is_physical = value == "1",
            other => tracing::warn!(code = other, "unrecognized device-information type code, skipping"),
        }
    }

    Ok(info)
}

/// Case-data fields: the header-group section's case/evidence/examiner
/// schema, analogous to device-information.
#[derive(Debug, Clone, Default)]
pub struct CaseData {
    pub case_number: String,
    pub evidence_number: String,
    pub examiner_name: String,
    pub notes: String,
    pub acquisition_date: String,
    pub system_date: String,
    pub acquisition_software: String,
    pub acquisition_platform: String,
    pub compression_used: Option<CompressionMethod>,
    pub unique_identifier: String,
}

const CASE_DATA_CODES: [&str; 10] = ["cn", "en", "ex", "nt", "ad", "sd", "sw", "pf", "cu", "id"];

fn compression_used_code(method: CompressionMethod) -> &'static str {
    match method {
        CompressionMethod::None => "0",
        CompressionMethod::Deflate => "1",
        CompressionMethod::Bzip2 => "2",
    }
}

fn compression_used_from_code(code: &str) -> Option<CompressionMethod> {
    match code {
        "0" => Some(CompressionMethod::None),
        "1" => Some(CompressionMethod::Deflate),
        "2" => Some(CompressionMethod::Bzip2),
        _ => None,
    }
}

pub fn generate_case_data(case: &CaseData) -> String {
    let values = [
        case.case_number.clone(),
        case.evidence_number.clone(),
        case.examiner_name.clone(),
        case.notes.clone(),
        case.acquisition_date.clone(),
        case.system_date.clone(),
        case.acquisition_software.clone(),
        case.acquisition_platform.clone(),
        case.compression_used.map(compression_used_code).unwrap_or_default().to_string(),
        case.unique_identifier.clone(),
    ];

    format!("1\nmain\n{}\n{}\n", CASE_DATA_CODES.join("\t"), values.join("\t"))
}

pub fn parse_case_data(text: &str) -> Result<CaseData> {
    let mut lines = text.lines();
    let _version = lines.next().ok_or_else(|| Error::conversion("missing line 1"))?;
    let _section_name = lines.next().ok_or_else(|| Error::conversion("missing line 2"))?;
    let codes_line = lines.next().ok_or_else(|| Error::conversion("missing type-code line"))?;
    let values_line = lines.next().unwrap_or("");

    let codes = split_tab_line(codes_line);
    let mut values = split_tab_line(values_line);
    values.resize(codes.len(), String::new());

    let mut case = CaseData::default();
    for (code, value) in codes.iter().zip(values.iter()) {
        match code.as_str() {
            "cn" => case.case_number = value.clone(),
            "en" => case.evidence_number = value.clone(),
            "ex" => case.examiner_name = value.clone(),
            "nt" => case.notes = value.clone(),
            "ad" => case.acquisition_date = value.clone(),
            "sd" => case.system_date = value.clone(),
            "sw" => case.acquisition_software = value.clone(),
            "pf" => case.acquisition_platform = value.clone(),
            "cu" => case.compression_used = compression_used_from_code(value),
            "id" => case.unique_identifier = value.clone(),
            other => tracing::warn!(code = other, "unrecognized case-data type code, skipping"),
        }
    }

    Ok(case)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_f_device_information_generate() {
        let info = DeviceInformation {
            serial_number: "SN-1".to_string(),
            model: "M".to_string(),
            device_label: String::new(),
            number_of_sectors: Some(2048),
            hpa_protected_sectors: None,
            dco_protected_sectors: None,
            drive_type: Some(DriveType::Fixed),
            process_identifier: String::new(),
            bytes_per_sector: Some(512),
            is_physical: true,
        };

        let generated = generate_device_information(&info);
        assert!(generated.contains("1\n"));
        assert!(generated.contains("main\n"));
        assert!(generated.contains("sn\tmd\tlb\tts\ths\tdc\tdt\tpid\trs\tls\tbp\tph"));
        assert!(generated.contains("SN-1\tM\t\t2048\t\t\tf\t\t\t\t512\t1"));
    }

    #[test]
    fn device_information_round_trips_through_parse() {
        let info = DeviceInformation {
            serial_number: "ABC123".to_string(),
            model: "WD20EZRX".to_string(),
            device_label: "Drive 1".to_string(),
            number_of_sectors: Some(3_907_029_168),
            hpa_protected_sectors: Some(0),
            dco_protected_sectors: None,
            drive_type: Some(DriveType::Fixed),
            process_identifier: "1234".to_string(),
            bytes_per_sector: Some(512),
            is_physical: true,
        };

        let generated = generate_device_information(&info);
        let parsed = parse_device_information(&generated).unwrap();
        assert_eq!(parsed.serial_number, info.serial_number);
        assert_eq!(parsed.model, info.model);
        assert_eq!(parsed.number_of_sectors, info.number_of_sectors);
        assert_eq!(parsed.drive_type, info.drive_type);
        assert_eq!(parsed.bytes_per_sector, info.bytes_per_sector);
        assert_eq!(parsed.is_physical, info.is_physical);
    }

    #[test]
    fn tolerates_trailing_carriage_return() {
        let text = "1\r\nmain\r\nsn\tmd\r\nX\tY\r\n";
        let parsed = parse_device_information(text).unwrap();
        assert_eq!(parsed.serial_number, "X");
        assert_eq!(parsed.model, "Y");
    }

    #[test]
    fn mismatched_value_count_is_padded_with_empty() {
        let text = "1\nmain\nsn\tmd\tlb\nX\n";
        let parsed = parse_device_information(text).unwrap();
        assert_eq!(parsed.serial_number, "X");
        assert_eq!(parsed.model, "");
        assert_eq!(parsed.device_label, "");
    }

    #[test]
    fn unknown_type_codes_are_skipped_not_fatal() {
        let text = "1\nmain\nsn\tzz\nX\tY\n";
        let parsed = parse_device_information(text).unwrap();
        assert_eq!(parsed.serial_number, "X");
    }

    #[test]
    fn case_data_round_trips() {
        let case = CaseData {
            case_number: "2026-001".to_string(),
            evidence_number: "EV-1".to_string(),
            examiner_name: "J. Doe".to_string(),
            notes: "first pass".to_string(),
            acquisition_date: "2026-07-30".to_string(),
            system_date: "2026-07-30".to_string(),
            acquisition_software: "ewf-cli".to_string(),
            acquisition_platform: "Linux".to_string(),
            compression_used: Some(CompressionMethod::Deflate),
            unique_identifier: "00000000-0000-0000-0000-000000000000".to_string(),
        };

        let generated = generate_case_data(&case);
        let parsed = parse_case_data(&generated).unwrap();
        assert_eq!(parsed.case_number, case.case_number);
        assert_eq!(parsed.examiner_name, case.examiner_name);
        assert_eq!(parsed.compression_used, case.compression_used);
    }

    #[test]
    fn wire_round_trip_is_utf16le_with_bom_and_deflate() {
        let text = generate_device_information(&DeviceInformation {
            serial_number: "X".to_string(),
            ..Default::default()
        });
        let wire = to_wire(&text).unwrap();
        let restored = from_wire(&wire).unwrap();
        assert_eq!(restored, text);
    }
}
