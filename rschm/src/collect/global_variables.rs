/// Point-cloud container extensions picked up from the input directory
pub const LIDAR_EXTENSIONS: [&str; 2] = ["las", "laz"];

/// ASPRS classification code of bare-earth returns
pub const GROUND_CLASSIFICATION: u8 = 2;

pub const CHM_FILE_NAME: &str = "chm_u16.bin";
pub const DTM_FILE_NAME: &str = "dtm_u16.bin";
pub const MASK_FILE_NAME: &str = "valid_u8.bin";
pub const METADATA_FILE_NAME: &str = "metadata.json";
