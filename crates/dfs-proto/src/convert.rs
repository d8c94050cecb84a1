use crate::FileInfo;
use chrono::{DateTime, TimeZone, Utc};
use dfs_types::{File, FileType};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unknown file type discriminant {0}")]
    UnknownFileType(i32),
    #[error("upload_date_unix_millis {0} is not a valid timestamp")]
    InvalidTimestamp(i64),
}

fn file_type_to_i32(t: FileType) -> i32 {
    match t {
        FileType::None => 0,
        FileType::GlusterFs => 1,
        FileType::GridFs => 2,
        FileType::SeaweedFs => 3,
    }
}

fn file_type_from_i32(v: i32) -> Result<FileType, ConvertError> {
    match v {
        0 => Ok(FileType::None),
        1 => Ok(FileType::GlusterFs),
        2 => Ok(FileType::GridFs),
        3 => Ok(FileType::SeaweedFs),
        other => Err(ConvertError::UnknownFileType(other)),
    }
}

impl From<&File> for FileInfo {
    fn from(f: &File) -> Self {
        FileInfo {
            id: f.id.clone(),
            biz: f.biz.clone(),
            name: f.name.clone(),
            md5: f.md5.clone(),
            user_id: f.user_id.clone(),
            domain: f.domain,
            size: f.size,
            chunk_size: f.chunk_size,
            upload_date_unix_millis: f.upload_date.timestamp_millis(),
            r#type: file_type_to_i32(f.file_type),
            ext_attr: f.ext_attr.clone(),
        }
    }
}

impl From<File> for FileInfo {
    fn from(f: File) -> Self {
        FileInfo::from(&f)
    }
}

impl TryFrom<FileInfo> for File {
    type Error = ConvertError;

    fn try_from(info: FileInfo) -> Result<Self, Self::Error> {
        let upload_date: DateTime<Utc> = Utc
            .timestamp_millis_opt(info.upload_date_unix_millis)
            .single()
            .ok_or(ConvertError::InvalidTimestamp(info.upload_date_unix_millis))?;
        Ok(File {
            id: info.id,
            biz: info.biz,
            name: info.name,
            md5: info.md5,
            user_id: info.user_id,
            domain: info.domain,
            size: info.size,
            chunk_size: info.chunk_size,
            upload_date,
            file_type: file_type_from_i32(info.r#type)?,
            ext_attr: info.ext_attr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> File {
        File {
            id: "f1".into(),
            biz: "b".into(),
            name: "n".into(),
            md5: "d41d8cd98f00b204e9800998ecf8427e".into(),
            user_id: "u1".into(),
            domain: 7,
            size: 1024,
            chunk_size: 4096,
            upload_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            file_type: FileType::GridFs,
            ext_attr: HashMap::from([("k".to_string(), "v".to_string())]),
        }
    }

    #[test]
    fn file_round_trips_through_file_info() {
        let original = sample_file();
        let info: FileInfo = (&original).into();
        let back: File = info.try_into().unwrap();
        assert_eq!(back.id, original.id);
        assert_eq!(back.md5, original.md5);
        assert_eq!(back.domain, original.domain);
        assert_eq!(back.file_type, original.file_type);
        assert_eq!(back.upload_date, original.upload_date);
        assert_eq!(back.ext_attr, original.ext_attr);
    }

    #[test]
    fn unknown_type_discriminant_is_rejected() {
        let mut info: FileInfo = (&sample_file()).into();
        info.r#type = 99;
        let err = File::try_from(info).unwrap_err();
        assert!(matches!(err, ConvertError::UnknownFileType(99)));
    }
}
