//! Fit results, one record type per fitter.
//!
//! Positions and FWHMs are in the physical units of the voxel spacing;
//! covariance entries are in those units squared. Every record lists its
//! columns through `fields()`, which fixes the export schema.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZFitRecord {
    pub z_bg: f64,
    pub z_amp: f64,
    pub z_mu: f64,
    pub z_sigma: f64,
    pub z_fwhm: f64,
    pub z_bg_sde: f64,
    pub z_amp_sde: f64,
    pub z_mu_sde: f64,
    pub z_sigma_sde: f64,
    pub z_fwhm_sde: f64,
}

impl ZFitRecord {
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("z_bg", self.z_bg),
            ("z_amp", self.z_amp),
            ("z_mu", self.z_mu),
            ("z_sigma", self.z_sigma),
            ("z_fwhm", self.z_fwhm),
            ("z_bg_sde", self.z_bg_sde),
            ("z_amp_sde", self.z_amp_sde),
            ("z_mu_sde", self.z_mu_sde),
            ("z_sigma_sde", self.z_sigma_sde),
            ("z_fwhm_sde", self.z_fwhm_sde),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct YXFitRecord {
    pub yx_bg: f64,
    pub yx_amp: f64,
    pub y_mu: f64,
    pub x_mu: f64,
    pub yx_cyy: f64,
    pub yx_cyx: f64,
    pub yx_cxx: f64,
    pub y_fwhm: f64,
    pub x_fwhm: f64,
    pub yx_pc1_fwhm: f64,
    pub yx_pc2_fwhm: f64,
    pub yx_bg_sde: f64,
    pub yx_amp_sde: f64,
    pub y_mu_sde: f64,
    pub x_mu_sde: f64,
    pub yx_cyy_sde: f64,
    pub yx_cyx_sde: f64,
    pub yx_cxx_sde: f64,
    pub y_fwhm_sde: f64,
    pub x_fwhm_sde: f64,
}

impl YXFitRecord {
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("yx_bg", self.yx_bg),
            ("yx_amp", self.yx_amp),
            ("y_mu", self.y_mu),
            ("x_mu", self.x_mu),
            ("yx_cyy", self.yx_cyy),
            ("yx_cyx", self.yx_cyx),
            ("yx_cxx", self.yx_cxx),
            ("y_fwhm", self.y_fwhm),
            ("x_fwhm", self.x_fwhm),
            ("yx_pc1_fwhm", self.yx_pc1_fwhm),
            ("yx_pc2_fwhm", self.yx_pc2_fwhm),
            ("yx_bg_sde", self.yx_bg_sde),
            ("yx_amp_sde", self.yx_amp_sde),
            ("y_mu_sde", self.y_mu_sde),
            ("x_mu_sde", self.x_mu_sde),
            ("yx_cyy_sde", self.yx_cyy_sde),
            ("yx_cyx_sde", self.yx_cyx_sde),
            ("yx_cxx_sde", self.yx_cxx_sde),
            ("y_fwhm_sde", self.y_fwhm_sde),
            ("x_fwhm_sde", self.x_fwhm_sde),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZYXFitRecord {
    pub zyx_bg: f64,
    pub zyx_amp: f64,
    pub zyx_z_mu: f64,
    pub zyx_y_mu: f64,
    pub zyx_x_mu: f64,
    pub zyx_czz: f64,
    pub zyx_czy: f64,
    pub zyx_czx: f64,
    pub zyx_cyy: f64,
    pub zyx_cyx: f64,
    pub zyx_cxx: f64,
    pub zyx_z_fwhm: f64,
    pub zyx_y_fwhm: f64,
    pub zyx_x_fwhm: f64,
    pub zyx_pc1_fwhm: f64,
    pub zyx_pc2_fwhm: f64,
    pub zyx_pc3_fwhm: f64,
    pub zyx_bg_sde: f64,
    pub zyx_amp_sde: f64,
    pub zyx_z_mu_sde: f64,
    pub zyx_y_mu_sde: f64,
    pub zyx_x_mu_sde: f64,
    pub zyx_czz_sde: f64,
    pub zyx_czy_sde: f64,
    pub zyx_czx_sde: f64,
    pub zyx_cyy_sde: f64,
    pub zyx_cyx_sde: f64,
    pub zyx_cxx_sde: f64,
    pub zyx_z_fwhm_sde: f64,
    pub zyx_y_fwhm_sde: f64,
    pub zyx_x_fwhm_sde: f64,
}

impl ZYXFitRecord {
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("zyx_bg", self.zyx_bg),
            ("zyx_amp", self.zyx_amp),
            ("zyx_z_mu", self.zyx_z_mu),
            ("zyx_y_mu", self.zyx_y_mu),
            ("zyx_x_mu", self.zyx_x_mu),
            ("zyx_czz", self.zyx_czz),
            ("zyx_czy", self.zyx_czy),
            ("zyx_czx", self.zyx_czx),
            ("zyx_cyy", self.zyx_cyy),
            ("zyx_cyx", self.zyx_cyx),
            ("zyx_cxx", self.zyx_cxx),
            ("zyx_z_fwhm", self.zyx_z_fwhm),
            ("zyx_y_fwhm", self.zyx_y_fwhm),
            ("zyx_x_fwhm", self.zyx_x_fwhm),
            ("zyx_pc1_fwhm", self.zyx_pc1_fwhm),
            ("zyx_pc2_fwhm", self.zyx_pc2_fwhm),
            ("zyx_pc3_fwhm", self.zyx_pc3_fwhm),
            ("zyx_bg_sde", self.zyx_bg_sde),
            ("zyx_amp_sde", self.zyx_amp_sde),
            ("zyx_z_mu_sde", self.zyx_z_mu_sde),
            ("zyx_y_mu_sde", self.zyx_y_mu_sde),
            ("zyx_x_mu_sde", self.zyx_x_mu_sde),
            ("zyx_czz_sde", self.zyx_czz_sde),
            ("zyx_czy_sde", self.zyx_czy_sde),
            ("zyx_czx_sde", self.zyx_czx_sde),
            ("zyx_cyy_sde", self.zyx_cyy_sde),
            ("zyx_cyx_sde", self.zyx_cyx_sde),
            ("zyx_cxx_sde", self.zyx_cxx_sde),
            ("zyx_z_fwhm_sde", self.zyx_z_fwhm_sde),
            ("zyx_y_fwhm_sde", self.zyx_y_fwhm_sde),
            ("zyx_x_fwhm_sde", self.zyx_x_fwhm_sde),
        ]
    }
}
