use embedded_hal::spi::SpiDevice;

use super::{Awake, DSpin, Standby};
use crate::{
    command::{Command, Frame, GetParam, SetParam, SimpleOpcode},
    lines::ControlLines,
    ll,
    registers::{self, Register},
    status::Status,
    Error,
};

impl<SPI, IO, State> DSpin<SPI, IO, State>
where
    SPI: SpiDevice,
    IO: ControlLines,
    State: Awake,
{
    /// Provides direct access to the register-level API
    ///
    /// Be aware that by using the register-level API, you can invalidate
    /// various assumptions that the high-level API makes about the operation
    /// of the dSPIN. Don't use the register-level and high-level APIs in
    /// tandem, unless you know what you're doing.
    pub fn ll(&mut self) -> &mut ll::DSpin<SPI, IO> {
        &mut self.ll
    }

    /// Sends any command and returns the raw reply
    pub fn exchange(&mut self, command: impl Into<Command>) -> Result<Frame, Error<SPI>> {
        Ok(self.ll.exchange(&command.into())?)
    }

    /// Reads a register
    pub fn read_register(&mut self, register: Register) -> Result<i64, Error<SPI>> {
        let reply = self.exchange(GetParam::new(register))?;
        let value = register.decode(reply.payload());
        debug!("read {} -> {}", register.name(), value);

        Ok(value)
    }

    /// Writes a register
    ///
    /// The value is truncated to the register width. Read-only registers are
    /// refused before anything is sent.
    pub fn write_register(&mut self, register: Register, value: i64) -> Result<(), Error<SPI>> {
        let command = SetParam::new(register, value)?;
        debug!("write {} <- {}", register.name(), value);
        self.exchange(command)?;

        Ok(())
    }

    /// Reads STATUS through GetStatus
    ///
    /// This resets the latched flags of the chip.
    pub fn get_status(&mut self) -> Result<Status, Error<SPI>> {
        let reply = self.exchange(SimpleOpcode::GetStatus)?;
        let status = Status(registers::STATUS.decode(reply.payload()) as u16);
        debug!("status {:?}", status);

        Ok(status)
    }

    /// Reads STATUS as a plain register, keeping the latched flags
    pub fn status(&mut self) -> Result<Status, Error<SPI>> {
        Ok(Status(self.read_register(registers::STATUS)? as u16))
    }

    /// Resets the latched status flags
    pub fn clear_status(&mut self) -> Result<(), Error<SPI>> {
        self.exchange(SimpleOpcode::GetStatus)?;
        Ok(())
    }

    /// Whether the switch input is closed
    ///
    /// The latched flags are kept.
    pub fn switch_closed(&mut self) -> Result<bool, Error<SPI>> {
        Ok(self.status()?.switch_closed())
    }

    /// Whether the BUSY line reports a running command
    pub fn is_busy(&mut self) -> Result<bool, Error<SPI>> {
        Ok(self.ll.is_busy()?)
    }

    /// Disables the power bridges immediately
    pub fn hard_hiz(&mut self) -> Result<(), Error<SPI>> {
        self.exchange(SimpleOpcode::HardHiZ)?;
        Ok(())
    }

    /// Resets the chip to its power-up conditions
    pub fn reset_device(&mut self) -> Result<(), Error<SPI>> {
        self.exchange(SimpleOpcode::ResetDevice)?;
        Ok(())
    }

    /// Leaves the chip in standby
    ///
    /// Latched flags are cleared and the bridges disabled before STBY/RST is
    /// pulled low. The chip loses its configuration.
    pub fn shutdown(mut self) -> Result<DSpin<SPI, IO, Standby>, Error<SPI>> {
        self.clear_status()?;
        self.hard_hiz()?;
        self.ll.set_standby(true)?;
        debug!("standby");

        Ok(DSpin {
            ll: self.ll,
            state: Standby,
        })
    }
}

macro_rules! impl_register_accessors {
    (
        $(
            $register:ident => $get:ident $(, $set:ident)?;
        )*
    ) => {
        impl<SPI, IO, State> DSpin<SPI, IO, State>
        where
            SPI: SpiDevice,
            IO: ControlLines,
            State: Awake,
        {
            $(
                #[doc = concat!("Reads ", stringify!($register))]
                pub fn $get(&mut self) -> Result<i64, Error<SPI>> {
                    self.read_register(registers::$register)
                }

                $(
                    #[doc = concat!("Writes ", stringify!($register))]
                    pub fn $set(&mut self, value: i64) -> Result<(), Error<SPI>> {
                        self.write_register(registers::$register, value)
                    }
                )?
            )*
        }
    };
}

impl_register_accessors! {
    ABS_POS => abs_pos, set_abs_pos;
    EL_POS => el_pos, set_el_pos;
    MARK => mark, set_mark;
    SPEED => speed;
    ACC => acc, set_acc;
    DEC => dec, set_dec;
    MAX_SPEED => max_speed, set_max_speed;
    MIN_SPEED => min_speed, set_min_speed;
    KVAL_HOLD => kval_hold, set_kval_hold;
    KVAL_RUN => kval_run, set_kval_run;
    KVAL_ACC => kval_acc, set_kval_acc;
    KVAL_DEC => kval_dec, set_kval_dec;
    INT_SPD => int_spd, set_int_spd;
    ST_SLP => st_slp, set_st_slp;
    FN_SLP_ACC => fn_slp_acc, set_fn_slp_acc;
    FN_SLP_DEC => fn_slp_dec, set_fn_slp_dec;
    K_THERM => k_therm, set_k_therm;
    ADC_OUT => adc_out;
    OCD_TH => ocd_th, set_ocd_th;
    STALL_TH => stall_th, set_stall_th;
    FS_SPD => fs_spd, set_fs_spd;
    STEP_MODE => step_mode, set_step_mode;
    ALARM_EN => alarm_en, set_alarm_en;
}
