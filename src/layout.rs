//! Sets constants for the disk layouts of node and result records

//for serialized nodes; the variable-width tail (bounding geometry, statistics)
//starts at NODE_FIXED_SIZE
pub const NODE_KIND_OFFSET: usize = 0;
pub const NODE_KIND_SIZE: usize = 1;

//internal: left child offset; leaf: range start
pub const NODE_LEFT_OFFSET: usize = NODE_KIND_OFFSET + NODE_KIND_SIZE;
pub const NODE_LEFT_SIZE: usize = 8;

//internal: right child offset; leaf: range end
pub const NODE_RIGHT_OFFSET: usize = NODE_LEFT_OFFSET + NODE_LEFT_SIZE;
pub const NODE_RIGHT_SIZE: usize = 8;

pub const NODE_COUNT_OFFSET: usize = NODE_RIGHT_OFFSET + NODE_RIGHT_SIZE;
pub const NODE_COUNT_SIZE: usize = 8;

pub const NODE_FIXED_SIZE: usize = NODE_COUNT_OFFSET + NODE_COUNT_SIZE;

pub const NODE_KIND_INTERNAL: u8 = 1;
pub const NODE_KIND_LEAF: u8 = 2;

pub const COORD_SIZE: usize = 4;

//the companion identity file carries one u64 per point and no header
pub const INDEX_FILE_SUFFIX: &str = ".ind";

//for batch result files; records are packed with no padding and written in
//native byte order so a reader on the same machine can map the file directly
pub const RESULT_COUNT_OFFSET: usize = 0;
pub const RESULT_COUNT_SIZE: usize = 4;

pub const RESULT_DATA_START: usize = RESULT_COUNT_OFFSET + RESULT_COUNT_SIZE;

pub const RESULT_POINT_ID_OFFSET: usize = 0;
pub const RESULT_POINT_ID_SIZE: usize = 8;

pub const RESULT_NEIGHBOR_ID_OFFSET: usize = RESULT_POINT_ID_OFFSET + RESULT_POINT_ID_SIZE;
pub const RESULT_NEIGHBOR_ID_SIZE: usize = 8;

pub const RESULT_DISTANCE_OFFSET: usize = RESULT_NEIGHBOR_ID_OFFSET + RESULT_NEIGHBOR_ID_SIZE;
pub const RESULT_DISTANCE_SIZE: usize = 4;

pub const RESULT_RECORD_SIZE: usize = RESULT_DISTANCE_OFFSET + RESULT_DISTANCE_SIZE;
